use std::sync::Arc;

use common::EmployerId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::MerchantAccount;
use ledger::InMemoryLedger;
use saga::{
    InMemoryIdentityService, InMemoryPaymentProcessor, MerchantOnboarding, Saga, SagaContext,
    SagaCoordinator, SagaError, Step,
};

fn noop_saga(steps: usize, fail_last: bool) -> Saga {
    let mut built: Vec<Step> = (0..steps)
        .map(|i| {
            Step::new(format!("step_{i}"), |_ctx: SagaContext| async { Ok(()) })
                .with_compensation(|_ctx: SagaContext| async { Ok(()) })
        })
        .collect();
    if fail_last {
        built.push(Step::new("fail", |_ctx: SagaContext| async {
            Err(SagaError::Validation("bench".to_string()))
        }));
    }
    Saga::new("bench", built)
}

fn bench_run_success(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let coordinator = SagaCoordinator::new();
    let saga = noop_saga(4, false);

    c.bench_function("saga/run_4_steps_success", |b| {
        b.iter(|| {
            rt.block_on(async {
                coordinator.run_saga(&SagaContext::new(), &saga).await.unwrap();
            });
        });
    });
}

fn bench_run_with_compensation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let coordinator = SagaCoordinator::new();
    let saga = noop_saga(4, true);

    c.bench_function("saga/run_4_steps_compensated", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _ = coordinator.run_saga(&SagaContext::new(), &saga).await;
            });
        });
    });
}

fn bench_create_merchant_account(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga/create_merchant_account", |b| {
        b.iter(|| {
            rt.block_on(async {
                let onboarding = MerchantOnboarding::new(
                    Arc::new(InMemoryIdentityService::new()),
                    Arc::new(InMemoryLedger::new()),
                    Arc::new(InMemoryPaymentProcessor::new()),
                    SagaCoordinator::new(),
                );
                let account =
                    MerchantAccount::new("Bench Bakery", "bench@bakery.test", EmployerId::new(1));
                onboarding
                    .create_merchant_account(&SagaContext::new(), account, "secret")
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_run_success,
    bench_run_with_compensation,
    bench_create_merchant_account
);
criterion_main!(benches);
