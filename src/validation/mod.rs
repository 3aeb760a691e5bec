/// Request validation helpers
///
/// Field-level rules live on the request types as `validator` derives; this
/// module holds the pieces those derives cannot express: JSON body
/// extraction with the API error shape, and lenient date parsing.
use crate::error::PantryError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// JSON body extractor whose rejections use the API error shape
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = PantryError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl From<JsonRejection> for PantryError {
    fn from(rejection: JsonRejection) -> Self {
        PantryError::Validation(rejection.body_text())
    }
}

/// Parse a client-supplied date.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
/// and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(field: &str, value: &str) -> Result<DateTime<Utc>, PantryError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| PantryError::Validation(format!("{} must be a valid date", field)))
}

/// Reject names that are empty after trimming
pub fn require_text(value: &str, message: &str) -> Result<String, PantryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PantryError::Validation(message.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date_formats() {
        let day = parse_date("date", "2024-03-05").unwrap();
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2024, 3, 5, 0));

        let ts = parse_date("date", "2024-03-05T18:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 16);

        let naive = parse_date("date", "2024-03-05T07:15:00").unwrap();
        assert_eq!(naive.minute(), 15);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        match parse_date("startDate", "next tuesday") {
            Err(PantryError::Validation(msg)) => assert!(msg.contains("startDate")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("  Rice ", "Name is required").unwrap(), "Rice");
        assert!(require_text("   ", "Name is required").is_err());
    }
}
