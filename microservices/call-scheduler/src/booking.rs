//! Paid booking intake: validate, create the session, schedule the call

use consultline_core::ServiceType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::session::CreateSessionParams;

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[validate(length(min = 1, max = 128))]
    pub client_id: String,

    #[validate(length(min = 1, max = 128))]
    pub provider_id: String,

    pub service_type: ServiceType,

    pub amount: Decimal,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    #[validate(length(min = 1))]
    pub payment_intent_id: String,

    #[validate(length(min = 6, max = 20))]
    pub client_phone: String,

    #[validate(length(min = 6, max = 20))]
    pub provider_phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<u64>,
}

impl BookingRequest {
    pub fn delay(&self) -> Option<Duration> {
        self.delay_minutes.map(|m| Duration::from_secs(m.saturating_mul(60)))
    }

    pub fn into_params(self) -> CreateSessionParams {
        CreateSessionParams {
            service_type: self.service_type,
            client_id: self.client_id,
            provider_id: self.provider_id,
            client_phone: self.client_phone,
            provider_phone: self.provider_phone,
            payment_intent_id: self.payment_intent_id,
            amount: self.amount,
            currency: self.currency.to_uppercase(),
        }
    }
}

/// List price of each consultation type
pub fn expected_price(service_type: ServiceType) -> Decimal {
    match service_type {
        ServiceType::LawyerCall => Decimal::from(49),
        ServiceType::ExpatCall => Decimal::from(19),
    }
}

/// Check the request before any session exists.
///
/// Amounts outside the configured bounds are rejected. A deviation from the
/// list price only logs a warning since localized pricing is legitimate.
pub fn validate_booking(request: &BookingRequest, config: &SchedulerConfig) -> Result<()> {
    request.validate()?;

    if request.amount < config.min_call_price {
        return Err(SchedulerError::Validation(format!(
            "amount {} is below the minimum of {}",
            request.amount, config.min_call_price
        )));
    }
    if request.amount > config.max_call_price {
        return Err(SchedulerError::Validation(format!(
            "amount {} exceeds the maximum of {}",
            request.amount, config.max_call_price
        )));
    }

    let expected = expected_price(request.service_type);
    if (request.amount - expected).abs() > config.price_tolerance {
        tracing::warn!(
            service_type = request.service_type.as_str(),
            amount = %request.amount,
            expected = %expected,
            "Booking amount differs from list price"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::booking_fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_bounds() {
        let config = SchedulerConfig::default();

        assert!(validate_booking(&booking_fixture(dec!(49)), &config).is_ok());

        let err = validate_booking(&booking_fixture(dec!(3)), &config).unwrap_err();
        assert!(matches!(err, SchedulerError::Validation(msg) if msg.contains("below")));

        let err = validate_booking(&booking_fixture(dec!(5000)), &config).unwrap_err();
        assert!(matches!(err, SchedulerError::Validation(msg) if msg.contains("exceeds")));
    }

    #[test]
    fn test_price_deviation_is_not_an_error() {
        let config = SchedulerConfig::default();
        // Localized price well off the lawyer list price
        assert!(validate_booking(&booking_fixture(dec!(79)), &config).is_ok());
    }

    #[test]
    fn test_field_validation() {
        let config = SchedulerConfig::default();
        let mut request = booking_fixture(dec!(49));
        request.client_phone = "12".to_string();
        assert!(matches!(
            validate_booking(&request, &config),
            Err(SchedulerError::Validation(_))
        ));

        let mut request = booking_fixture(dec!(49));
        request.provider_id = String::new();
        assert!(validate_booking(&request, &config).is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "clientId": "client-1",
            "providerId": "lawyer-7",
            "serviceType": "lawyer_call",
            "amount": 49,
            "paymentIntentId": "pi_123",
            "clientPhone": "+33612345678",
            "providerPhone": "+33698765432"
        }))
        .unwrap();

        assert_eq!(request.currency, "EUR");
        assert_eq!(request.amount, dec!(49));
        assert_eq!(request.delay(), None);
        assert_eq!(request.into_params().service_type, ServiceType::LawyerCall);
    }
}
