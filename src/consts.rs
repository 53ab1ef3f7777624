pub const SERVICE_NAME: &str = "WhatsApp Gateway API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix the messaging client expects on individual chat addresses
pub const CHAT_ADDRESS_SUFFIX: &str = "@c.us";
pub const PHONE_MIN_LEN: usize = 10;
pub const PHONE_MAX_LEN: usize = 15;

/// State reported by the messaging client once its socket is usable
pub const CLIENT_CONNECTED_STATE: &str = "CONNECTED";

pub const API_KEY_HEADER: &str = "x-api-key";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

pub const ACCEPTED_IMAGE_EXTENSIONS: [(&str, &str); 5] = [
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];
