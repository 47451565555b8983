fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `plan --json` stays pipeable
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    vnuma_planner::cli::run()
}
