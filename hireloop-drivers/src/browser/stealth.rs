//! Browser launch arguments and page-load scripts per stealth level.
use hireloop_config::StealthLevel;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
}

fn desktop_profiles() -> Vec<UserAgentProfile> {
    vec![
        UserAgentProfile {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            viewport: (1920, 1080),
            platform: "Win32".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        },
        UserAgentProfile {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            viewport: (1440, 900),
            platform: "MacIntel".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
        },
    ]
}

/// Pick the profile used for the whole session.
pub fn pick_profile() -> UserAgentProfile {
    let mut profiles = desktop_profiles();
    let index = OsRng.gen_range(0..profiles.len());
    profiles.swap_remove(index)
}

/// Chrome command‑line arguments for a stealth level and profile.
pub fn chrome_arguments(
    level: StealthLevel,
    profile: &UserAgentProfile,
    headless: bool,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!("--user-agent={}", profile.user_agent),
        format!("--window-size={},{}", profile.viewport.0, profile.viewport.1),
        format!("--lang={}", profile.languages.join(",")),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    if headless || level == StealthLevel::Maximum {
        args.push("--disable-gpu".to_string());
    }
    args
}

/// Scripts executed after every navigation, in order.
pub fn evasion_scripts(level: StealthLevel, profile: &UserAgentProfile) -> Vec<String> {
    let mut scripts = vec![CORE_EVASIONS.to_string()];
    if level != StealthLevel::Lightweight {
        scripts.push(CANVAS_EVASIONS.to_string());
    }
    if level == StealthLevel::Maximum {
        scripts.push(WEBGL_EVASIONS.to_string());
        scripts.push(format!(
            "Object.defineProperty(navigator, 'platform', {{ get: () => '{}' }});",
            profile.platform
        ));
    }
    scripts
}

const CORE_EVASIONS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en']
    });
    if (!window.chrome) window.chrome = { runtime: {} };
"#;

const WEBGL_EVASIONS: &str = r#"
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(parameter) {
        if (parameter === 37445) return 'Intel Inc.';
        if (parameter === 37446) return 'Intel Iris OpenGL Engine';
        return getParameter.call(this, parameter);
    };
"#;

const CANVAS_EVASIONS: &str = r#"
    const getContext = HTMLCanvasElement.prototype.getContext;
    HTMLCanvasElement.prototype.getContext = function(type,...args){
        const ctx = getContext.call(this,type,...args);
        if(type==='2d' && ctx) {
            const origToDataURL=this.toDataURL;
            this.toDataURL=function(...a){
                const imgdata=ctx.getImageData(0,0,this.width,this.height);
                for(let i=0;i<imgdata.data.length;i+=4){
                    if(Math.random()<0.001)imgdata.data[i]+=Math.random()<0.5?-1:1;
                }
                ctx.putImageData(imgdata,0,0);
                return origToDataURL.call(this,...a);
            };
        }
        return ctx;
    };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_count_grows_with_the_level() {
        let profile = pick_profile();
        assert_eq!(evasion_scripts(StealthLevel::Lightweight, &profile).len(), 1);
        assert_eq!(evasion_scripts(StealthLevel::Balanced, &profile).len(), 2);
        let maximum = evasion_scripts(StealthLevel::Maximum, &profile);
        assert_eq!(maximum.len(), 4);
        assert!(maximum[3].contains(&profile.platform));
    }

    #[test]
    fn headless_sessions_get_headless_flags() {
        let profile = pick_profile();
        let args = chrome_arguments(StealthLevel::Balanced, &profile, true);
        assert!(args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&format!("--user-agent={}", profile.user_agent)));

        let windowed = chrome_arguments(StealthLevel::Balanced, &profile, false);
        assert!(!windowed.iter().any(|a| a.starts_with("--headless")));
    }
}
