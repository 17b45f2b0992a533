//! CLI entrypoint of the `kinescope` broadcast appliance server.

fn main() -> Result<(), kinescope::cli::Failure> {
    kinescope::run()
}
