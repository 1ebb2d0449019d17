//! HTTP ingestion service for ad events and creator earnings lookups.

mod application;
mod handlers;
mod state;

#[cfg(test)]
mod tests;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    application::run().await.map_err(|err| {
        eprintln!("[api] bootstrap failed: {err}");
        std::io::Error::other(err.to_string())
    })
}
