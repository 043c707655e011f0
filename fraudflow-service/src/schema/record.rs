// Transaction Record
// Field names and the canonical schema of an ingested transaction event

use super::registry::{FieldType, SchemaRegistry};

pub const TRANSACTION_ID: &str = "TransactionID";
pub const USER_ID: &str = "UserID";
pub const TRANSACTION_DATE: &str = "TransactionDate";
pub const TRANSACTION_AMOUNT: &str = "TransactionAmount";
pub const TRANSACTION_TYPE: &str = "TransactionType";
pub const MERCHANT_ID: &str = "MerchantID";
pub const CURRENCY: &str = "Currency";
pub const TRANSACTION_STATUS: &str = "TransactionStatus";
pub const DEVICE_TYPE: &str = "DeviceType";
pub const IP_ADDRESS: &str = "IP_Address";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const SUSPICIOUS_FLAG: &str = "SuspiciousFlag";
pub const IS_FRAUD: &str = "IsFraud";
pub const ANOMALY_SCORE: &str = "AnomalyScore";
pub const AGE: &str = "Age";
pub const GENDER: &str = "Gender";
pub const ACCOUNT_CREATION_DATE: &str = "AccountCreationDate";
pub const LOCATION: &str = "Location";
pub const LOCATION_COORDINATES: &str = "LocationCoordinates";
pub const ACCOUNT_STATUS: &str = "AccountStatus";
pub const DEVICE_ID: &str = "DeviceID";
pub const USER_PROFILE_COMPLETENESS: &str = "UserProfileCompleteness";
pub const PREVIOUS_FRAUD_ATTEMPTS: &str = "PreviousFraudAttempts";

/// Every field of a transaction event, in canonical column order
pub const TRANSACTION_FIELDS: [(&str, FieldType); 23] = [
    (TRANSACTION_ID, FieldType::String),
    (USER_ID, FieldType::String),
    (TRANSACTION_DATE, FieldType::Timestamp),
    (TRANSACTION_AMOUNT, FieldType::Double),
    (TRANSACTION_TYPE, FieldType::String),
    (MERCHANT_ID, FieldType::String),
    (CURRENCY, FieldType::String),
    (TRANSACTION_STATUS, FieldType::String),
    (DEVICE_TYPE, FieldType::String),
    (IP_ADDRESS, FieldType::String),
    (PAYMENT_METHOD, FieldType::String),
    (SUSPICIOUS_FLAG, FieldType::Boolean),
    (IS_FRAUD, FieldType::Boolean),
    (ANOMALY_SCORE, FieldType::Double),
    (AGE, FieldType::Integer),
    (GENDER, FieldType::String),
    (ACCOUNT_CREATION_DATE, FieldType::Timestamp),
    (LOCATION, FieldType::String),
    (LOCATION_COORDINATES, FieldType::String),
    (ACCOUNT_STATUS, FieldType::String),
    (DEVICE_ID, FieldType::String),
    (USER_PROFILE_COMPLETENESS, FieldType::Double),
    (PREVIOUS_FRAUD_ATTEMPTS, FieldType::Integer),
];

impl SchemaRegistry {
    /// The canonical transaction schema; every field is nullable
    pub fn transactions() -> Self {
        let mut schema = SchemaRegistry::new();
        for (name, field_type) in TRANSACTION_FIELDS {
            // names are unique, so definition cannot conflict
            let _ = schema.define(name, field_type, true);
        }
        schema
    }
}
