//! Request header helpers

/// User agent sent with every SDK request
pub fn sdk_user_agent() -> String {
    format!("savedsearch-rs/{}", crate::VERSION)
}

/// Accept header for JSON API responses
pub fn accept_json() -> &'static str {
    "application/json,text/javascript,*/*;q=0.01"
}
