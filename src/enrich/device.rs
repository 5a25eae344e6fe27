use crate::models::DeviceInfo;

/// Classify a raw user-agent with ordered substring heuristics.
///
/// First match wins in every category. Chrome is checked before Safari
/// because Chrome user-agents carry both tokens.
pub fn classify_user_agent(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();

    let device_type = if ua.contains("mobile") {
        "Mobile"
    } else if ua.contains("tablet") {
        "Tablet"
    } else {
        "Desktop"
    };

    let browser = if ua.contains("chrome") {
        "Chrome"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("safari") {
        "Safari"
    } else if ua.contains("edge") {
        "Edge"
    } else if ua.contains("opera") {
        "Opera"
    } else {
        "Unknown"
    };

    let os = if ua.contains("windows") {
        "Windows"
    } else if ua.contains("mac os") {
        "macOS"
    } else if ua.contains("linux") {
        "Linux"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "iOS"
    } else {
        "Unknown"
    };

    DeviceInfo {
        device_type: device_type.to_string(),
        browser: browser.to_string(),
        os: os.to_string(),
    }
}
