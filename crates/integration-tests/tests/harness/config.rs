//! Configuration pointing Conduit at a mock backend

use conduit_config::Config;

/// Parse a configuration whose model section targets `base_url`
///
/// The API key is read from `CONDUIT_TEST_KEY`, falling back to `test-key`.
pub fn config_for(base_url: &str) -> Config {
    let toml = format!(
        r#"
[model]
provider = "openai"
name = "mock-model-1"
base_url = "{base_url}"
api_key = "{{{{ env.CONDUIT_TEST_KEY | default("test-key") }}}}"
"#
    );

    Config::from_toml_str(&toml).expect("valid test configuration")
}
