use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use url::Url;

const WAIT_BETWEEN_RETRIES: Duration = Duration::from_secs(2);

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert {}: {}", sslrootcert_path, e))?;
    builder.set_verify(SslVerifyMode::PEER);

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Split the `sslrootcert` parameter off a connection URL
///
/// tokio-postgres does not understand `sslrootcert`, so it is removed from
/// the query string and returned separately.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, String), String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.into_owned());
        } else {
            clean_params.push(format!("{}={}", key, value));
        }
    }
    let sslrootcert_path = sslrootcert_path.ok_or("sslrootcert parameter missing")?;

    let mut clean_url = url.clone();
    if clean_params.is_empty() {
        clean_url.set_query(None);
    } else {
        clean_url.set_query(Some(&clean_params.join("&")));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Run `operation` on a fresh connection, retrying up to `attempts` times
///
/// Configuration problems (bad URL, unreadable CA file) fail immediately;
/// connection and query errors are retried.
pub async fn execute_with_retry<F, Fut>(
    database_url: &str,
    attempts: usize,
    operation: F,
) -> Result<(), String>
where
    F: Fn(tokio_postgres::Client) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<u64, tokio_postgres::Error>> + Send,
{
    let (clean_database_url, sslrootcert_path) = split_sslrootcert(database_url)?;
    let connector = create_ssl_connector(&sslrootcert_path)?;
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match tokio_postgres::connect(&clean_database_url, connector.clone()).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("Connection error: {}", e);
                    }
                });

                match operation(client).await {
                    Ok(_) => return Ok(()),
                    Err(e) => warn!("Attempt {}/{}: query error: {}", attempt, attempts, e),
                }
            }
            Err(e) => warn!("Attempt {}/{}: connection error: {}", attempt, attempts, e),
        }

        if attempt < attempts {
            tokio::time::sleep(WAIT_BETWEEN_RETRIES).await;
        }
    }

    Err(format!("Giving up after {} attempts", attempts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sslrootcert() {
        let (url, cert) = split_sslrootcert(
            "postgres://logger:pw@db.local:5432/readings?sslmode=require&sslrootcert=/etc/ca.pem",
        )
        .unwrap();
        assert_eq!(url, "postgres://logger:pw@db.local:5432/readings?sslmode=require");
        assert_eq!(cert, "/etc/ca.pem");
    }

    #[test]
    fn test_split_sslrootcert_only_param() {
        let (url, _) =
            split_sslrootcert("postgres://logger@db.local/readings?sslrootcert=ca.pem").unwrap();
        assert_eq!(url, "postgres://logger@db.local/readings");
    }

    #[test]
    fn test_split_sslrootcert_missing() {
        assert!(split_sslrootcert("postgres://logger@db.local/readings").is_err());
        assert!(split_sslrootcert("::").is_err());
    }

    #[tokio::test]
    async fn test_bad_ca_file_fails_without_retrying() {
        let result = execute_with_retry(
            "postgres://logger@127.0.0.1/readings?sslrootcert=/nonexistent/ca.pem",
            5,
            |client| async move { client.execute("SELECT 1", &[]).await },
        )
        .await;
        assert!(result.unwrap_err().contains("CA cert"));
    }
}
