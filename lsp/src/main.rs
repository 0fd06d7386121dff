#[tokio::main]
async fn main() {
    pdx_lsp::run().await;
}
