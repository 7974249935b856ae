//! Storage key constants.

/// Storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived API access token
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Long-lived token exchanged for new access tokens
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Every key the client writes, in deletion order.
    pub const ALL: [&'static str; 2] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN];
}
