//! Brazilian postal-code (CEP) providers
//!
//! Each provider is a descriptor: a URL template and a parser that maps the
//! provider's JSON shape into an [`Address`]. Every parsed address goes
//! through the same completeness check, so a provider that answers without a
//! city or region counts as a failed attempt and the resolver moves on.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::cascade::Failure;
use crate::http::{FetchOptions, Fetched, HttpError, RetryingHttpClient};
use crate::models::Address;

#[derive(Error, Debug)]
pub enum PostalError {
    #[error("{provider}: CEP {cep} not found")]
    NotFound { provider: &'static str, cep: String },

    #[error("{provider}: response is missing {missing}")]
    Incomplete {
        provider: &'static str,
        missing: &'static str,
    },

    #[error("{provider}: unexpected response shape: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: HttpError,
    },
}

impl From<PostalError> for Failure {
    fn from(err: PostalError) -> Self {
        match err {
            PostalError::NotFound { .. } => Failure::NoMatch(err.to_string()),
            PostalError::Incomplete { .. } => Failure::IncompleteData(err.to_string()),
            PostalError::Malformed { .. } | PostalError::Http { .. } => {
                Failure::ProviderUnavailable(err.to_string())
            }
        }
    }
}

/// Static description of one postal provider
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub default_base_url: &'static str,
    url: fn(&str, &str) -> String,
    parse: fn(Value, &str) -> Result<Address, PostalError>,
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("default_base_url", &self.default_base_url)
            .finish_non_exhaustive()
    }
}

/// Providers in the order they are tried
pub static PROVIDERS: [ProviderDescriptor; 3] = [
    ProviderDescriptor {
        name: "viacep",
        default_base_url: "https://viacep.com.br",
        url: viacep_url,
        parse: parse_viacep,
    },
    ProviderDescriptor {
        name: "apicep",
        default_base_url: "https://cdn.apicep.com",
        url: apicep_url,
        parse: parse_apicep,
    },
    ProviderDescriptor {
        name: "brasilapi",
        default_base_url: "https://brasilapi.com.br",
        url: brasilapi_url,
        parse: parse_brasilapi,
    },
];

/// One configured provider: a descriptor plus the base URL to call
#[derive(Debug, Clone)]
pub struct PostalProvider {
    descriptor: &'static ProviderDescriptor,
    base_url: String,
}

impl PostalProvider {
    #[must_use]
    pub fn new(descriptor: &'static ProviderDescriptor, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .unwrap_or(descriptor.default_base_url)
            .trim_end_matches('/')
            .to_string();
        Self {
            descriptor,
            base_url,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    #[must_use]
    pub fn url_for(&self, cep: &str) -> String {
        (self.descriptor.url)(&self.base_url, cep)
    }

    /// Look up an 8-digit CEP and return a complete address
    #[instrument(skip(self, http, options), fields(provider = self.descriptor.name))]
    pub async fn lookup(
        &self,
        http: &RetryingHttpClient,
        cep: &str,
        options: &FetchOptions,
    ) -> Result<Fetched<Address>, PostalError> {
        let provider = self.descriptor.name;
        let url = self.url_for(cep);

        let fetched = http
            .get_json::<Value>(&url, options)
            .await
            .map_err(|source| match source.status() {
                Some(404) => PostalError::NotFound {
                    provider,
                    cep: cep.to_string(),
                },
                _ => PostalError::Http { provider, source },
            })?;

        let address = (self.descriptor.parse)(fetched.body, cep)?;
        let address = ensure_complete(provider, address)?;
        debug!(
            "{} resolved CEP {} to {}",
            provider,
            cep,
            address.label().unwrap_or_default()
        );

        Ok(Fetched {
            body: address,
            insecure: fetched.insecure,
        })
    }
}

/// Providers in table order with their default base URLs
#[must_use]
pub fn default_providers() -> Vec<PostalProvider> {
    PROVIDERS
        .iter()
        .map(|descriptor| PostalProvider::new(descriptor, None))
        .collect()
}

/// Strip everything that is not an ASCII digit
#[must_use]
pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

fn viacep_url(base: &str, cep: &str) -> String {
    format!("{base}/ws/{cep}/json/")
}

fn apicep_url(base: &str, cep: &str) -> String {
    format!("{base}/file/apicep/{}.json", hyphenate(cep))
}

fn brasilapi_url(base: &str, cep: &str) -> String {
    format!("{base}/api/cep/v1/{cep}")
}

fn hyphenate(cep: &str) -> String {
    if cep.len() == 8 && cep.is_ascii() {
        format!("{}-{}", &cep[..5], &cep[5..])
    } else {
        cep.to_string()
    }
}

fn ensure_complete(provider: &'static str, address: Address) -> Result<Address, PostalError> {
    let blank = |field: &Option<String>| field.as_deref().is_none_or(|v| v.trim().is_empty());
    if blank(&address.city) {
        return Err(PostalError::Incomplete {
            provider,
            missing: "city",
        });
    }
    if blank(&address.region_code) {
        return Err(PostalError::Incomplete {
            provider,
            missing: "region",
        });
    }
    Ok(address)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn malformed(provider: &'static str, err: &serde_json::Error) -> PostalError {
    PostalError::Malformed {
        provider,
        reason: err.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    /// `true` (or `"true"`) when the CEP does not exist
    erro: Option<Value>,
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    ddd: Option<String>,
}

fn parse_viacep(value: Value, cep: &str) -> Result<Address, PostalError> {
    const PROVIDER: &str = "viacep";
    let response: ViaCepResponse =
        serde_json::from_value(value).map_err(|e| malformed(PROVIDER, &e))?;

    let not_found = match &response.erro {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if not_found {
        return Err(PostalError::NotFound {
            provider: PROVIDER,
            cep: cep.to_string(),
        });
    }

    Ok(Address {
        street: non_blank(response.logradouro),
        neighborhood: non_blank(response.bairro),
        city: non_blank(response.localidade),
        region_code: non_blank(response.uf),
        postal_code: cep.to_string(),
        area_code: non_blank(response.ddd),
        approximate: false,
    })
}

#[derive(Debug, Deserialize)]
struct ApiCepResponse {
    status: Option<u16>,
    ok: Option<bool>,
    address: Option<String>,
    district: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

fn parse_apicep(value: Value, cep: &str) -> Result<Address, PostalError> {
    const PROVIDER: &str = "apicep";
    let response: ApiCepResponse =
        serde_json::from_value(value).map_err(|e| malformed(PROVIDER, &e))?;

    if response.ok == Some(false) || response.status.is_some_and(|s| s != 200) {
        return Err(PostalError::NotFound {
            provider: PROVIDER,
            cep: cep.to_string(),
        });
    }

    Ok(Address {
        street: non_blank(response.address),
        neighborhood: non_blank(response.district),
        city: non_blank(response.city),
        region_code: non_blank(response.state),
        postal_code: cep.to_string(),
        area_code: None,
        approximate: false,
    })
}

#[derive(Debug, Deserialize)]
struct BrasilApiResponse {
    street: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

fn parse_brasilapi(value: Value, cep: &str) -> Result<Address, PostalError> {
    const PROVIDER: &str = "brasilapi";
    let response: BrasilApiResponse =
        serde_json::from_value(value).map_err(|e| malformed(PROVIDER, &e))?;

    Ok(Address {
        street: non_blank(response.street),
        neighborhood: non_blank(response.neighborhood),
        city: non_blank(response.city),
        region_code: non_blank(response.state),
        postal_code: cep.to_string(),
        area_code: None,
        approximate: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Backoff;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> FetchOptions {
        FetchOptions::new(Duration::from_secs(5), 0, Backoff::Fixed(Duration::ZERO))
    }

    fn http() -> RetryingHttpClient {
        RetryingHttpClient::new("smartclima-test", false).unwrap()
    }

    #[test]
    fn test_provider_order_and_urls() {
        let providers = default_providers();
        let names: Vec<_> = providers.iter().map(PostalProvider::name).collect();
        assert_eq!(names, ["viacep", "apicep", "brasilapi"]);

        assert_eq!(
            providers[0].url_for("01310100"),
            "https://viacep.com.br/ws/01310100/json/"
        );
        assert_eq!(
            providers[1].url_for("01310100"),
            "https://cdn.apicep.com/file/apicep/01310-100.json"
        );
        assert_eq!(
            providers[2].url_for("01310100"),
            "https://brasilapi.com.br/api/cep/v1/01310100"
        );
    }

    #[test]
    fn test_base_url_override_drops_trailing_slash() {
        let provider = PostalProvider::new(&PROVIDERS[0], Some("http://localhost:9000/"));
        assert_eq!(
            provider.url_for("20040002"),
            "http://localhost:9000/ws/20040002/json/"
        );
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("01.310-100"), "01310100");
        assert_eq!(digits_only(" 01310 100 "), "01310100");
        assert_eq!(digits_only("abc"), "");
    }

    #[test]
    fn test_parse_viacep() {
        let address = parse_viacep(
            json!({
                "cep": "01310-100",
                "logradouro": "Avenida Paulista",
                "bairro": "Bela Vista",
                "localidade": "São Paulo",
                "uf": "SP",
                "ddd": "11"
            }),
            "01310100",
        )
        .unwrap();

        assert_eq!(address.city.as_deref(), Some("São Paulo"));
        assert_eq!(address.region_code.as_deref(), Some("SP"));
        assert_eq!(address.area_code.as_deref(), Some("11"));
        assert_eq!(address.postal_code, "01310100");
        assert!(!address.approximate);
    }

    #[test]
    fn test_viacep_sentinel() {
        let err = parse_viacep(json!({"erro": true}), "99999999").unwrap_err();
        assert!(matches!(err, PostalError::NotFound { .. }));

        let err = parse_viacep(json!({"erro": "true"}), "99999999").unwrap_err();
        assert!(matches!(err, PostalError::NotFound { .. }));
    }

    #[test]
    fn test_apicep_sentinel() {
        let err = parse_apicep(
            json!({"status": 404, "ok": false, "message": "CEP not found"}),
            "99999999",
        )
        .unwrap_err();
        assert!(matches!(err, PostalError::NotFound { .. }));

        let address = parse_apicep(
            json!({"status": 200, "ok": true, "code": "20040-002", "state": "RJ", "city": "Rio de Janeiro", "district": "Centro"}),
            "20040002",
        )
        .unwrap();
        assert_eq!(address.label().as_deref(), Some("Rio de Janeiro, RJ"));
    }

    #[test]
    fn test_missing_city_is_incomplete() {
        let address = parse_brasilapi(json!({"state": "SP"}), "01310100").unwrap();
        let err = ensure_complete("brasilapi", address).unwrap_err();
        assert!(matches!(err, PostalError::Incomplete { missing: "city", .. }));
        assert_eq!(Failure::from(err).kind(), "incomplete-data");
    }

    #[test]
    fn test_failure_mapping() {
        let not_found = PostalError::NotFound {
            provider: "viacep",
            cep: "99999999".into(),
        };
        let failure = Failure::from(not_found);
        assert!(failure.is_recoverable());
        assert_eq!(failure.kind(), "no-match");

        let http = PostalError::Http {
            provider: "viacep",
            source: HttpError::Status(503),
        };
        assert_eq!(Failure::from(http).kind(), "provider-unavailable");
    }

    #[tokio::test]
    async fn test_lookup_viacep() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ws/01310100/json/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cep": "01310-100",
                "logradouro": "Avenida Paulista",
                "bairro": "Bela Vista",
                "localidade": "São Paulo",
                "uf": "SP",
                "ddd": "11"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PostalProvider::new(&PROVIDERS[0], Some(&server.uri()));
        let fetched = provider
            .lookup(&http(), "01310100", &options())
            .await
            .unwrap();

        assert_eq!(fetched.body.city.as_deref(), Some("São Paulo"));
        assert!(!fetched.insecure);
    }

    #[tokio::test]
    async fn test_lookup_brasilapi_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cep/v1/99999999"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"name": "CepPromiseError", "type": "service_error"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = PostalProvider::new(&PROVIDERS[2], Some(&server.uri()));
        let err = provider
            .lookup(&http(), "99999999", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, PostalError::NotFound { provider: "brasilapi", .. }));
    }

    #[tokio::test]
    async fn test_lookup_server_error_is_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let provider = PostalProvider::new(&PROVIDERS[1], Some(&server.uri()));
        let err = provider
            .lookup(&http(), "01310100", &options())
            .await
            .unwrap_err();
        assert!(matches!(err, PostalError::Http { .. }));
    }
}
