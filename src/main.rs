fn main() -> anyhow::Result<()> {
    flow_viewer::run()
}
