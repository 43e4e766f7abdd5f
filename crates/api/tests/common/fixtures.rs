use reqdesk_api::models::{LoginRequest, UnlockRequest};
use reqdesk_session::{TimeoutMode, TimeoutSettings};

pub const TEST_USERNAME: &str = "alice";
pub const TEST_PASSWORD: &str = "test_password_123";

pub fn sample_login_request() -> LoginRequest {
    LoginRequest {
        username: TEST_USERNAME.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}

pub fn sample_unlock_request(password: &str) -> UnlockRequest {
    UnlockRequest {
        password: password.to_string(),
    }
}

/// Settings long enough that no timer fires during a test.
pub const fn relaxed_settings() -> TimeoutSettings {
    TimeoutSettings {
        mode: TimeoutMode::Lock,
        timeout_ms: 3_600_000,
        lock_timeout_ms: 3_600_000,
        warning_seconds: 60,
    }
}

/// Settings that lock within a fraction of a second.
pub const fn quick_lock_settings() -> TimeoutSettings {
    TimeoutSettings {
        mode: TimeoutMode::Lock,
        timeout_ms: 200,
        lock_timeout_ms: 200,
        warning_seconds: 0,
    }
}
