use gbp_api::{Client, GbpApiError, Request};
use secrecy::SecretString;

#[tokio::main]
pub async fn main() -> Result<(), GbpApiError> {
    let client = Client::new(&SecretString::from("access_token".to_string()));

    let accounts = client.send(Request::accounts().list()).await?;
    let Some(account) = accounts.accounts.first() else {
        return Ok(());
    };

    let req = Request::reviews(account.id(), "location_id")
        .list()
        .page_size(50u32);

    let _res = client.send(req).await?;
    Ok(())
}
