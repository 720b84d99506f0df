use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;
use watch_logging::{watch_debug, watch_info};

use crate::AuthError;

/// Produces an authenticated portal session for one cycle.
///
/// The session is dropped when the cycle is done with it; implementations
/// release their resources in `Drop`.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Send + Sync;

    async fn authenticate(&self) -> Result<Self::Session, AuthError>;
}

#[derive(Clone)]
pub struct LoginSettings {
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Bound on every request made while logging in.
    pub timeout: Duration,
    pub identity_selector: String,
    pub password_selector: String,
    pub user_agent: String,
}

impl LoginSettings {
    pub fn new(
        login_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
            identity_selector: "#identity".to_string(),
            password_selector: "#password".to_string(),
            user_agent: concat!("portal_watch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl fmt::Debug for LoginSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSettings")
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("identity_selector", &self.identity_selector)
            .field("password_selector", &self.password_selector)
            .finish()
    }
}

/// A logged-in portal session: an HTTP client carrying the session cookies.
pub struct PortalSession {
    client: reqwest::Client,
    landing_url: Url,
}

impl PortalSession {
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Page the portal redirected to after a successful login.
    pub fn landing_url(&self) -> &Url {
        &self.landing_url
    }
}

impl fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalSession")
            .field("landing_url", &self.landing_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Drop for PortalSession {
    fn drop(&mut self) {
        watch_debug!(
            "Released portal session for {}",
            self.landing_url.host_str().unwrap_or("portal")
        );
    }
}

/// Logs in by submitting the portal's login form over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    settings: LoginSettings,
}

impl HttpSessionProvider {
    pub fn new(settings: LoginSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, AuthError> {
        reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(self.settings.timeout)
            .timeout(self.settings.timeout)
            .user_agent(self.settings.user_agent.clone())
            .build()
            .map_err(|err| AuthError::Network(err.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionProvider for HttpSessionProvider {
    type Session = PortalSession;

    async fn authenticate(&self) -> Result<PortalSession, AuthError> {
        let login_url = Url::parse(&self.settings.login_url)
            .map_err(|err| AuthError::LoginForm(format!("invalid login url: {err}")))?;
        let client = self.build_client()?;

        watch_debug!("Opening login page {}", login_url);
        let page = client
            .get(login_url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        if !page.status().is_success() {
            return Err(AuthError::HttpStatus(page.status().as_u16()));
        }
        let page_url = page.url().clone();
        let body = page.text().await.map_err(map_reqwest_error)?;
        let form = parse_login_form(&body, &page_url, &self.settings)?;

        watch_debug!("Submitting login form to {}", form.action);
        let response = client
            .post(form.action)
            .form(&form.fields)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let landing_url = response.url().clone();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::HttpStatus(status.as_u16()));
        }
        // The portal answers a rejected login by showing the login page again.
        if landing_url.as_str().to_ascii_lowercase().contains("login") {
            return Err(AuthError::InvalidCredentials);
        }

        watch_info!("Logged in; landed on {}", landing_url);
        Ok(PortalSession {
            client,
            landing_url,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoginForm {
    action: Url,
    fields: Vec<(String, String)>,
}

fn parse_login_form(
    html: &str,
    page_url: &Url,
    settings: &LoginSettings,
) -> Result<LoginForm, AuthError> {
    let parse = |css: &str| {
        Selector::parse(css).map_err(|err| AuthError::LoginForm(format!("selector {css}: {err}")))
    };
    let form_sel = parse("form")?;
    let identity_sel = parse(&settings.identity_selector)?;
    let password_sel = parse(&settings.password_selector)?;
    let input_sel = parse("input[name], button[name]")?;

    let doc = Html::parse_document(html);
    let form = doc
        .select(&form_sel)
        .find(|form| {
            form.select(&identity_sel).next().is_some()
                && form.select(&password_sel).next().is_some()
        })
        .ok_or_else(|| {
            AuthError::LoginForm(format!(
                "no form containing {} and {}",
                settings.identity_selector, settings.password_selector
            ))
        })?;

    let field_name = |sel: &Selector, fallback: &str| {
        form.select(sel)
            .next()
            .and_then(|input| input.value().attr("name"))
            .unwrap_or(fallback)
            .to_string()
    };
    let identity_name = field_name(&identity_sel, "identity");
    let password_name = field_name(&password_sel, "password");

    let mut fields = Vec::new();
    let mut submit_seen = false;
    for input in form.select(&input_sel) {
        let element = input.value();
        let Some(name) = element.attr("name") else {
            continue;
        };
        if name == identity_name || name == password_name {
            continue;
        }
        let value = element.attr("value").unwrap_or_default();
        // A button without a type attribute submits its form.
        let default_type = if element.name() == "button" {
            "submit"
        } else {
            "text"
        };
        match element
            .attr("type")
            .unwrap_or(default_type)
            .to_ascii_lowercase()
            .as_str()
        {
            "hidden" => fields.push((name.to_string(), value.to_string())),
            "submit" if !submit_seen => {
                submit_seen = true;
                fields.push((name.to_string(), value.to_string()));
            }
            "checkbox" | "radio" if element.attr("checked").is_some() => {
                let value = if value.is_empty() { "on" } else { value };
                fields.push((name.to_string(), value.to_string()));
            }
            _ => {}
        }
    }
    fields.push((identity_name, settings.username.clone()));
    fields.push((password_name, settings.password.clone()));

    let action = match form
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|action| !action.is_empty())
    {
        Some(action) => page_url
            .join(action)
            .map_err(|err| AuthError::LoginForm(format!("form action {action}: {err}")))?,
        None => page_url.clone(),
    };

    Ok(LoginForm { action, fields })
}

fn map_reqwest_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        return AuthError::Timeout;
    }
    AuthError::Network(err.to_string())
}
