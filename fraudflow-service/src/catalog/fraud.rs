// Fraud Detection Catalog
// Raw transactions through conformed facts and dimensions to gold metrics

use crate::dataset::{DatasetRegistry, DatasetSpec};
use crate::error::ServiceResult;
use crate::layer::{ExecutionMode, Tier};
use crate::schema::record::*;
use crate::transform::{
    alert_filter, Aggregate, AggregateColumn, AggregateFunction, Chain, ColumnRef, Filter, Join,
    JoinColumn, Predicate, RiskLevel, Select,
};

pub const RAW_TRANSACTIONS: &str = "br_fraud_detection_raw_data_historical";
pub const TRANSACTIONS_FACT: &str = "si_transactions_fact";
pub const USERS_DIMENSION: &str = "si_users_dimension";
pub const DEVICES_DIMENSION: &str = "si_devices_dimension";
pub const USER_BEHAVIOR_METRICS: &str = "go_user_behavior_metrics";
pub const MERCHANT_RISK_ASSESSMENT: &str = "go_merchant_risk_assessment";
pub const REAL_TIME_FRAUD_DETECTION: &str = "go_real_time_fraud_detection";
pub const PREDICTIVE_MODEL_FEATURES: &str = "go_predictive_model_features";
pub const DASHBOARD_METRICS: &str = "go_fraud_detection_dashboard_metrics";

/// Catalog datasets in registration order
pub const FRAUD_DETECTION_DATASETS: [&str; 9] = [
    RAW_TRANSACTIONS,
    TRANSACTIONS_FACT,
    USERS_DIMENSION,
    DEVICES_DIMENSION,
    USER_BEHAVIOR_METRICS,
    MERCHANT_RISK_ASSESSMENT,
    REAL_TIME_FRAUD_DETECTION,
    PREDICTIVE_MODEL_FEATURES,
    DASHBOARD_METRICS,
];

/// Label column added to alert rows
pub const FRAUD_RISK_LEVEL: &str = "fraud_risk_level";

fn is_fraud() -> Predicate {
    Predicate::is_true(IS_FRAUD)
}

/// Register the fraud detection pipeline
pub fn fraud_detection() -> ServiceResult<DatasetRegistry> {
    let mut registry = DatasetRegistry::new();

    registry.register_spec(
        DatasetSpec::new(RAW_TRANSACTIONS, Tier::Raw)
            .comment("Bronze table for raw fraud detection data"),
    )?;

    registry.register_spec(
        DatasetSpec::new(TRANSACTIONS_FACT, Tier::Conformed)
            .upstreams([RAW_TRANSACTIONS])
            .comment("Silver table for fraud detection transactions")
            .transform(Select::columns(TRANSACTION_FIELDS.iter().map(|(name, _)| *name)).distinct()),
    )?;

    registry.register_spec(
        DatasetSpec::new(USERS_DIMENSION, Tier::Conformed)
            .upstreams([RAW_TRANSACTIONS])
            .mode(ExecutionMode::FullRecompute)
            .comment("Silver quality Users Dimension table")
            .transform(
                Aggregate::by([USER_ID])
                    .agg(AggregateColumn::first(AGE))
                    .agg(AggregateColumn::first(GENDER))
                    .agg(AggregateColumn::first(ACCOUNT_CREATION_DATE))
                    .agg(AggregateColumn::first(ACCOUNT_STATUS))
                    .agg(AggregateColumn::first(USER_PROFILE_COMPLETENESS))
                    .agg(AggregateColumn::first(PREVIOUS_FRAUD_ATTEMPTS))
                    .agg(AggregateColumn::new(
                        "UserLocation",
                        AggregateFunction::First,
                        LOCATION,
                    )),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(DEVICES_DIMENSION, Tier::Conformed)
            .upstreams([RAW_TRANSACTIONS])
            .mode(ExecutionMode::FullRecompute)
            .comment("Silver quality Devices Dimension table")
            .transform(
                Aggregate::by([DEVICE_ID])
                    .agg(AggregateColumn::first(DEVICE_TYPE))
                    .agg(AggregateColumn::first(IP_ADDRESS)),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(USER_BEHAVIOR_METRICS, Tier::Aggregated)
            .upstreams([TRANSACTIONS_FACT])
            .comment("Gold quality table for user behavior metrics")
            .transform(
                Aggregate::by([USER_ID])
                    .agg(AggregateColumn::new(
                        "total_transactions",
                        AggregateFunction::Count,
                        TRANSACTION_ID,
                    ))
                    .agg(AggregateColumn::new(
                        "avg_transaction_amount",
                        AggregateFunction::Avg,
                        TRANSACTION_AMOUNT,
                    ))
                    .agg(
                        AggregateColumn::new(
                            "total_fraud_transactions",
                            AggregateFunction::Count,
                            TRANSACTION_ID,
                        )
                        .when(is_fraud()),
                    )
                    .agg(AggregateColumn::new(
                        "unique_devices",
                        AggregateFunction::CountDistinct,
                        DEVICE_ID,
                    ))
                    .agg(AggregateColumn::new(
                        "last_transaction_date",
                        AggregateFunction::Max,
                        TRANSACTION_DATE,
                    ))
                    .agg(AggregateColumn::new(
                        "first_transaction_date",
                        AggregateFunction::Min,
                        TRANSACTION_DATE,
                    )),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(MERCHANT_RISK_ASSESSMENT, Tier::Aggregated)
            .upstreams([TRANSACTIONS_FACT])
            .comment("Gold quality table for merchant risk assessment")
            .transform(
                Aggregate::by([MERCHANT_ID])
                    .agg(AggregateColumn::new(
                        "total_transactions",
                        AggregateFunction::Count,
                        TRANSACTION_ID,
                    ))
                    .agg(
                        AggregateColumn::new(
                            "total_fraud_transactions",
                            AggregateFunction::Count,
                            TRANSACTION_ID,
                        )
                        .when(is_fraud()),
                    )
                    .agg(
                        AggregateColumn::new(
                            "total_fraudulent_amount",
                            AggregateFunction::Sum,
                            TRANSACTION_AMOUNT,
                        )
                        .when(is_fraud()),
                    )
                    .agg(AggregateColumn::new(
                        "avg_anomaly_score",
                        AggregateFunction::Avg,
                        ANOMALY_SCORE,
                    ))
                    .agg(AggregateColumn::new(
                        "unique_users",
                        AggregateFunction::CountDistinct,
                        USER_ID,
                    )),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(REAL_TIME_FRAUD_DETECTION, Tier::Derived)
            .upstreams([TRANSACTIONS_FACT])
            .comment("Gold quality table for real-time fraud detection")
            .transform(
                Chain::new()
                    .then(Filter::new(alert_filter(ANOMALY_SCORE, IS_FRAUD)))
                    .then(Select::columns([
                        TRANSACTION_ID,
                        TRANSACTION_DATE,
                        TRANSACTION_AMOUNT,
                        TRANSACTION_TYPE,
                        USER_ID,
                        MERCHANT_ID,
                        DEVICE_ID,
                        IP_ADDRESS,
                        ANOMALY_SCORE,
                        IS_FRAUD,
                    ]))
                    .then(RiskLevel::new(ANOMALY_SCORE, FRAUD_RISK_LEVEL)),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(PREDICTIVE_MODEL_FEATURES, Tier::Derived)
            .upstreams([TRANSACTIONS_FACT, USER_BEHAVIOR_METRICS, MERCHANT_RISK_ASSESSMENT])
            .comment("Gold quality table for predictive model features")
            .transform(
                Join::new()
                    .on(ColumnRef::new(0, USER_ID), ColumnRef::new(1, USER_ID))
                    .on(ColumnRef::new(0, MERCHANT_ID), ColumnRef::new(2, MERCHANT_ID))
                    .select(JoinColumn::new(0, TRANSACTION_ID))
                    .select(JoinColumn::new(0, TRANSACTION_AMOUNT))
                    .select(JoinColumn::new(0, TRANSACTION_TYPE))
                    .select(JoinColumn::new(0, ANOMALY_SCORE))
                    .select(JoinColumn::aliased(1, "total_transactions", "user_total_transactions"))
                    .select(JoinColumn::aliased(
                        1,
                        "avg_transaction_amount",
                        "user_avg_transaction_amount",
                    ))
                    .select(JoinColumn::aliased(
                        1,
                        "total_fraud_transactions",
                        "user_fraud_transactions",
                    ))
                    .select(JoinColumn::aliased(
                        2,
                        "total_fraud_transactions",
                        "merchant_fraud_transactions",
                    ))
                    .select(JoinColumn::aliased(
                        2,
                        "avg_anomaly_score",
                        "merchant_avg_anomaly_score",
                    ))
                    .select(JoinColumn::new(0, IS_FRAUD)),
            ),
    )?;

    registry.register_spec(
        DatasetSpec::new(DASHBOARD_METRICS, Tier::Aggregated)
            .upstreams([TRANSACTIONS_FACT])
            .comment("Gold quality table for reporting and dashboarding metrics")
            .transform(
                Aggregate::global()
                    .agg(AggregateColumn::new(
                        "total_transactions",
                        AggregateFunction::Count,
                        TRANSACTION_ID,
                    ))
                    .agg(AggregateColumn::count_rows("total_fraud_transactions").when(is_fraud()))
                    .agg(
                        AggregateColumn::new(
                            "total_fraudulent_amount",
                            AggregateFunction::Sum,
                            TRANSACTION_AMOUNT,
                        )
                        .when(is_fraud()),
                    )
                    .agg(AggregateColumn::new(
                        "unique_users",
                        AggregateFunction::CountDistinct,
                        USER_ID,
                    ))
                    .agg(AggregateColumn::new(
                        "unique_merchants",
                        AggregateFunction::CountDistinct,
                        MERCHANT_ID,
                    ))
                    .agg(AggregateColumn::new(
                        "avg_anomaly_score",
                        AggregateFunction::Avg,
                        ANOMALY_SCORE,
                    ))
                    .agg(AggregateColumn::new(
                        "last_transaction_date",
                        AggregateFunction::Max,
                        TRANSACTION_DATE,
                    )),
            ),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registers_in_order() {
        let registry = fraud_detection().unwrap();
        assert_eq!(registry.execution_order(), FRAUD_DETECTION_DATASETS.to_vec());
        assert!(registry.graph().is_ok());
    }

    #[test]
    fn test_catalog_tiers_and_modes() {
        let registry = fraud_detection().unwrap();
        assert_eq!(registry.tier_of(RAW_TRANSACTIONS).unwrap(), Tier::Raw);
        assert_eq!(
            registry.mode_for(TRANSACTIONS_FACT).unwrap(),
            ExecutionMode::AppendOnlyStream
        );
        assert_eq!(
            registry.mode_for(USERS_DIMENSION).unwrap(),
            ExecutionMode::FullRecompute
        );
        assert_eq!(
            registry.mode_for(DASHBOARD_METRICS).unwrap(),
            ExecutionMode::FullRecompute
        );
        assert!(registry.get(PREDICTIVE_MODEL_FEATURES).unwrap().is_fan_in());
    }

    #[test]
    fn test_dimensions_read_raw_layer() {
        let registry = fraud_detection().unwrap();
        for name in [USERS_DIMENSION, DEVICES_DIMENSION] {
            assert_eq!(registry.upstreams_of(name).unwrap(), [RAW_TRANSACTIONS.to_string()]);
        }
    }
}
