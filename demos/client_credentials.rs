//! Demonstrates a region-bound client that acquires a client-credentials token lazily, reuses it
//! across Game API requests, and surfaces 404 as an error.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use blizzard_client::{Client, Region, RegionEndpoints, error::Error};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":86399}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/data/wow/token/index").query_param("locale", "en_US");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"last_updated_timestamp\":1700000000000,\"price\":2650000000}");
		})
		.await;

	let client = Client::builder("demo-client", "demo-secret", Region::US)
		.endpoints(RegionEndpoints::custom(server.url(""), server.url(""), "en_US"))
		.build()?;
	let token_price = client.authorized_get(&client.data_path("/wow/token/index")).await?;

	println!("WoW token index ({}): {}", token_price.status, token_price.text());

	match client.authorized_get(&client.data_path("/wow/realm/nowhere")).await {
		Err(Error::NotFound { status }) => println!("Missing realm reported as {status}."),
		other => println!("Unexpected outcome: {other:?}."),
	}

	if let Some(token) = client.cached_token() {
		println!("Reused token expires at {}.", token.expires_at);
	}

	token_mock.assert_async().await;

	Ok(())
}
