//! End-to-end admission flow tests over the in-memory providers.
//!
//! These exercise the contracts the whole subsystem hangs on: admission
//! never over-sells, one order per user, and pending-list recovery never
//! loses or duplicates a record.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use chrono::{TimeDelta, Utc};
use flashsale_core::admission::AdmissionService;
use flashsale_core::materializer::{MaterializerConfig, OrderMaterializer};
use flashsale_core::mocks::{
    MemoryAdmissionGate, MemoryIdGenerator, MemoryIntakeQueue, MemoryLock, MemoryOrderStore,
};
use flashsale_core::providers::{IntakeQueue, VoucherStore};
use flashsale_core::types::{AdmissionOutcome, UserId, Voucher, VoucherId};
use std::time::Duration;

type Service = AdmissionService<MemoryIdGenerator, MemoryAdmissionGate>;
type Worker = OrderMaterializer<MemoryIntakeQueue, MemoryLock, MemoryOrderStore>;

struct Harness {
    service: Service,
    worker: Worker,
    queue: MemoryIntakeQueue,
    orders: MemoryOrderStore,
}

async fn harness(voucher_id: i64, stock: i64) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let queue = MemoryIntakeQueue::new();
    let gate = MemoryAdmissionGate::new(queue.clone());
    let orders = MemoryOrderStore::new();

    orders
        .create_voucher(&Voucher {
            id: VoucherId(voucher_id),
            stock,
            begin_at: Utc::now(),
            end_at: Utc::now() + TimeDelta::hours(1),
        })
        .await
        .unwrap();

    let service = AdmissionService::new(MemoryIdGenerator::new(), gate);
    service.open_sale(VoucherId(voucher_id), stock).await.unwrap();

    let worker = OrderMaterializer::new(
        queue.clone(),
        MemoryLock::new(),
        orders.clone(),
        MaterializerConfig::default(),
    );

    Harness {
        service,
        worker,
        queue,
        orders,
    }
}

/// Materialize and acknowledge everything currently in the queue.
async fn drain(queue: &MemoryIntakeQueue, worker: &Worker) {
    loop {
        let deliveries = queue.read_new(64, Duration::ZERO).await.unwrap();
        if deliveries.is_empty() {
            break;
        }
        for delivery in deliveries {
            worker.materialize(&delivery.record).await.unwrap();
            queue.ack(&delivery.delivery_id).await.unwrap();
        }
    }
}

#[tokio::test]
async fn admits_exactly_stock_under_contention() {
    const ATTEMPTS: i64 = 100;
    const STOCK: i64 = 10;

    let h = harness(1, STOCK).await;

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|user| {
            let service = h.service.clone();
            tokio::spawn(async move { service.submit(VoucherId(1), UserId(user)).await })
        })
        .collect();

    let mut admitted = 0;
    let mut out_of_stock = 0;
    for handle in futures::future::join_all(handles).await {
        match handle.unwrap().unwrap() {
            AdmissionOutcome::Admitted { .. } => admitted += 1,
            AdmissionOutcome::OutOfStock => out_of_stock += 1,
            AdmissionOutcome::AlreadyOrdered => panic!("distinct users cannot be duplicates"),
        }
    }

    assert_eq!(admitted, STOCK);
    assert_eq!(out_of_stock, ATTEMPTS - STOCK);

    drain(&h.queue, &h.worker).await;

    let rows = h.orders.orders();
    assert_eq!(rows.len(), usize::try_from(STOCK).unwrap());
    let voucher = h.orders.get_voucher(VoucherId(1)).await.unwrap().unwrap();
    assert_eq!(voucher.stock, 0);
}

#[tokio::test]
async fn last_unit_goes_to_exactly_one_buyer() {
    let h = harness(1, 1).await;

    let first = {
        let service = h.service.clone();
        tokio::spawn(async move { service.submit(VoucherId(1), UserId(1)).await })
    };
    let second = {
        let service = h.service.clone();
        tokio::spawn(async move { service.submit(VoucherId(1), UserId(2)).await })
    };

    let (first, second) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());

    let winners = [&first, &second]
        .iter()
        .filter(|o| matches!(o, AdmissionOutcome::Admitted { .. }))
        .count();
    let losers = [&first, &second]
        .iter()
        .filter(|o| matches!(o, AdmissionOutcome::OutOfStock))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, 1);

    drain(&h.queue, &h.worker).await;
    assert_eq!(h.orders.orders().len(), 1);
}

#[tokio::test]
async fn second_attempt_by_same_user_is_rejected() {
    let h = harness(1, 2).await;

    let first = h.service.submit(VoucherId(1), UserId(7)).await.unwrap();
    assert!(matches!(first, AdmissionOutcome::Admitted { .. }));

    let second = h.service.submit(VoucherId(1), UserId(7)).await.unwrap();
    assert_eq!(second, AdmissionOutcome::AlreadyOrdered);

    drain(&h.queue, &h.worker).await;

    let rows = h.orders.orders();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, UserId(7));
}

#[tokio::test]
async fn crash_before_ack_is_recovered_without_duplicates() {
    let h = harness(1, 3).await;

    for user in 0..3 {
        let outcome = h.service.submit(VoucherId(1), UserId(user)).await.unwrap();
        assert!(matches!(outcome, AdmissionOutcome::Admitted { .. }));
    }

    // The doomed worker reads everything, materializes one record durably,
    // then dies before acknowledging anything.
    let delivered = h.queue.read_new(8, Duration::ZERO).await.unwrap();
    assert_eq!(delivered.len(), 3);
    h.worker.materialize(&delivered[0].record).await.unwrap();
    assert_eq!(h.queue.pending_len(), 3);

    // A replacement worker runs the pending recovery pass: the completed
    // record aborts idempotently, the other two materialize now.
    h.worker.drain_pending().await;

    assert_eq!(h.queue.pending_len(), 0);
    let rows = h.orders.orders();
    assert_eq!(rows.len(), 3);
    let voucher = h.orders.get_voucher(VoucherId(1)).await.unwrap().unwrap();
    assert_eq!(voucher.stock, 0);
}

#[tokio::test]
async fn order_id_is_final_at_admission_time() {
    let h = harness(1, 1).await;

    let AdmissionOutcome::Admitted { order_id } =
        h.service.submit(VoucherId(1), UserId(1)).await.unwrap()
    else {
        panic!("expected admission");
    };

    drain(&h.queue, &h.worker).await;

    let rows = h.orders.orders();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, order_id);
}
