use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    // Point the client at it with COURIER_BASE_URL.
    println!("serving on http://{}", listener.local_addr()?);
    mock_server::run(listener).await
}
