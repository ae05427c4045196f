//! App registration instructions shown when no client id is configured.

use std::path::Path;

use crate::config::{ENV_CLIENT_ID, ENV_CLIENT_SECRET, ProviderKind};

const GOOGLE_STEPS: &str = "\
1. Go to https://console.cloud.google.com/ and create a project.
2. APIs & Services -> Library: enable the Gmail API.
3. OAuth consent screen: add the scope https://mail.google.com/
   and add your address as a test user.
4. Credentials -> Create Credentials -> OAuth client ID,
   application type \"TVs and Limited Input devices\".
5. Copy the client ID and client secret.";

const MICROSOFT_STEPS: &str = "\
1. Go to https://portal.azure.com/ -> App registrations -> New registration.
2. Leave the redirect URI empty.
3. Authentication: enable \"Allow public client flows\".
4. Copy the Application (client) ID.";

const CUSTOM_STEPS: &str = "\
Register a client that is allowed to use the device authorization
grant and note its client id (and secret, if one is issued).";

/// Builds the setup guide for `provider`, pointing at `config_path`.
pub fn instructions(provider: ProviderKind, config_path: &Path) -> String {
    let rule = "=".repeat(67);
    let steps = match provider {
        ProviderKind::Google => GOOGLE_STEPS,
        ProviderKind::Microsoft => MICROSOFT_STEPS,
        ProviderKind::Custom => CUSTOM_STEPS,
    };

    format!(
        "{rule}
MAILTOKEN OAUTH2 SETUP
{rule}

No OAuth2 client id is configured. Register an OAuth application with
your mail provider first:

{steps}

Then save the credentials in {path}:

  {{
    \"provider\": \"{name}\",
    \"client_id\": \"...\",
    \"client_secret\": \"...\"
  }}

or export {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET}, then run:

  mailtoken --authorize
{rule}",
        path = config_path.display(),
        name = provider_name(provider),
    )
}

const fn provider_name(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Google => "google",
        ProviderKind::Microsoft => "microsoft",
        ProviderKind::Custom => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_instructions() {
        let path = Path::new("/home/me/.config/mailtoken/config.json");
        let text = instructions(ProviderKind::Google, path);
        assert!(text.contains("console.cloud.google.com"));
        assert!(text.contains("/home/me/.config/mailtoken/config.json"));
        assert!(text.contains("\"provider\": \"google\""));
        assert!(text.contains("mailtoken --authorize"));
        assert!(text.starts_with("=====") && text.ends_with("====="));
    }

    #[test]
    fn test_microsoft_instructions() {
        let text = instructions(ProviderKind::Microsoft, Path::new("config.json"));
        assert!(text.contains("portal.azure.com"));
        assert!(text.contains("\"provider\": \"microsoft\""));
        assert!(!text.contains("Gmail"));
    }
}
