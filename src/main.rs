use dash_loader::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await.inspect_err(|err| {
        eprintln!("dash-loader errored out: {err:#}");
    })
}
