#![allow(dead_code)]

use akin_university::application::registrar::{Registrar, Registration};
use akin_university::config::RegistrationPolicy;
use akin_university::domain::course::{Course, NewCourse};
use akin_university::domain::money::{Amount, Money};
use akin_university::domain::payment::ChargeOutcome;
use akin_university::domain::ports::{PaymentGateway, PaymentGatewayRef, RegistryStoreBox};
use akin_university::error::{RegistryError, Result};
use akin_university::infrastructure::clock::FixedClock;
use akin_university::infrastructure::gateway::StaticGateway;
use akin_university::infrastructure::in_memory::InMemoryRegistryStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap()
}

/// A registrar wired to an in-memory store, a fixed clock and a
/// counting gateway the test keeps a handle on.
pub struct Harness {
    pub registrar: Arc<Registrar>,
    pub gateway: Arc<StaticGateway>,
    pub clock: Arc<FixedClock>,
}

pub fn test_policy() -> RegistrationPolicy {
    RegistrationPolicy {
        bcrypt_cost: 4,
        gateway_timeout: Duration::from_millis(200),
        ..RegistrationPolicy::default()
    }
}

pub fn harness() -> Harness {
    harness_with(
        Box::new(InMemoryRegistryStore::new()),
        StaticGateway::approving(),
        test_policy(),
    )
}

pub fn harness_with(
    store: RegistryStoreBox,
    gateway: StaticGateway,
    policy: RegistrationPolicy,
) -> Harness {
    let gateway = Arc::new(gateway);
    let clock = Arc::new(FixedClock::new(start_time()));
    let registrar = Registrar::new(store, gateway.clone(), clock.clone(), policy);
    Harness {
        registrar: Arc::new(registrar),
        gateway,
        clock,
    }
}

/// A registrar whose gateway is an arbitrary implementation.
pub fn registrar_with_gateway(gateway: PaymentGatewayRef, policy: RegistrationPolicy) -> Registrar {
    Registrar::new(
        Box::new(InMemoryRegistryStore::new()),
        gateway,
        Arc::new(FixedClock::new(start_time())),
        policy,
    )
}

pub fn registration(name: &str, email: &str) -> Registration {
    Registration {
        name: name.to_string(),
        email: email.to_string(),
        ..Registration::default()
    }
}

pub fn random_email() -> String {
    let n: u64 = rand::thread_rng().r#gen();
    format!("student{}@example.com", n)
}

pub fn new_course(title: &str, price: Decimal, duration_months: u32, credits: u32) -> NewCourse {
    NewCourse {
        title: title.to_string(),
        description: format!("{} description", title),
        level: Some("Undergraduate".to_string()),
        price: Money::new(price).unwrap(),
        duration_months,
        credits,
    }
}

pub async fn add_course(registrar: &Registrar, title: &str, price: Decimal) -> Course {
    registrar
        .add_course(new_course(title, price, 6, 3))
        .await
        .unwrap()
}

pub fn money(value: Decimal) -> Money {
    Money::new(value).unwrap()
}

/// Never answers within any reasonable timeout.
pub struct HangingGateway;

#[async_trait]
impl PaymentGateway for HangingGateway {
    async fn charge(&self, _account: &str, _amount: Amount) -> Result<ChargeOutcome> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(RegistryError::PaymentFailed("unreachable".to_string()))
    }
}

/// Fails every call at the transport level.
pub struct BrokenGateway;

#[async_trait]
impl PaymentGateway for BrokenGateway {
    async fn charge(&self, _account: &str, _amount: Amount) -> Result<ChargeOutcome> {
        Err(RegistryError::PaymentFailed("connection refused".to_string()))
    }
}
