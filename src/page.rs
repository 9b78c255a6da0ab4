use url::Url;

use crate::error::Result;

/// Query parameters of the page hosting the widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageParams {
    /// `dl`: deep link selecting a solution
    pub deep_link: Option<String>,
    /// `sheetId`: context-parameter override
    pub sheet_id: Option<String>,
    /// `plugin_id` present: agent-assist mode, live chat disabled
    pub is_agent_assist: bool,
    /// `embed` present: no iframe, no session storage
    pub embed: bool,
    /// `mobile=true` anywhere in the URL
    pub mobile: bool,
    page_url: Option<Url>,
}

impl PageParams {
    pub fn parse(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)?;

        let first_value = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };
        let has_param = |name: &str| url.query_pairs().any(|(k, _)| k == name);

        Ok(Self {
            deep_link: first_value("dl"),
            sheet_id: first_value("sheetId"),
            is_agent_assist: has_param("plugin_id"),
            embed: has_param("embed"),
            mobile: page_url.contains("mobile=true"),
            page_url: Some(url),
        })
    }

    /// `{page}/../static/config.json`, normalized
    pub fn static_config_url(&self) -> Result<String> {
        let Some(page) = &self.page_url else {
            return Err(crate::error::BootstrapError::Config(
                "no page URL to derive static config location from".to_string(),
            ));
        };
        let raw = format!(
            "{}://{}{}/../static/config.json",
            page.scheme(),
            authority(page),
            page.path()
        );
        Ok(Url::parse(&raw)?.to_string())
    }
}

fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_params() {
        let params = PageParams::parse(
            "https://demo.example.com/widget/index.html?dl=sales&sheetId=abc%20123&plugin_id=7&embed&mobile=true",
        )
        .expect("url should parse");
        assert_eq!(params.deep_link.as_deref(), Some("sales"));
        assert_eq!(params.sheet_id.as_deref(), Some("abc 123"));
        assert!(params.is_agent_assist);
        assert!(params.embed);
        assert!(params.mobile);
    }

    #[test]
    fn test_parse_without_params() {
        let params = PageParams::parse("https://demo.example.com/").expect("url should parse");
        assert_eq!(params.deep_link, None);
        assert_eq!(params.sheet_id, None);
        assert!(!params.is_agent_assist);
        assert!(!params.embed);
        assert!(!params.mobile);
    }

    #[test]
    fn test_empty_deep_link_is_absent() {
        let params = PageParams::parse("https://demo.example.com/?dl=").expect("url should parse");
        assert_eq!(params.deep_link, None);
    }

    #[test]
    fn test_static_config_url_is_sibling_of_page() {
        let params = PageParams::parse("http://localhost:8080/widget/index.html?dl=x")
            .expect("url should parse");
        assert_eq!(
            params.static_config_url().expect("static url"),
            "http://localhost:8080/widget/static/config.json"
        );
    }

    #[test]
    fn test_static_config_url_without_page() {
        assert!(PageParams::default().static_config_url().is_err());
    }
}
