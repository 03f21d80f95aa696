use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub claims_sent: u64,
    pub claims_rejected: u64,
    pub claims_unreachable: u64,
    pub rewards_sent_total: u64,
    pub wallets_created: u64,
    pub wallet_failures: u64,
    pub wallet_races_lost: u64,
    pub mines_found: u64,
    pub mines_failed: u64,
}

/// Process-wide counters for ledger round trips.
#[derive(Default)]
pub struct Metrics {
    claims_sent: AtomicU64,
    claims_rejected: AtomicU64,
    claims_unreachable: AtomicU64,
    rewards_sent_total: AtomicU64,
    wallets_created: AtomicU64,
    wallet_failures: AtomicU64,
    wallet_races_lost: AtomicU64,
    mines_found: AtomicU64,
    mines_failed: AtomicU64,
}

impl Metrics {
    pub fn inc_claim_sent(&self, amount: u64) {
        self.claims_sent.fetch_add(1, Ordering::Relaxed);
        self.rewards_sent_total.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn inc_claim_rejected(&self) {
        self.claims_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_claim_unreachable(&self) {
        self.claims_unreachable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_wallet_created(&self) {
        self.wallets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_wallet_failure(&self) {
        self.wallet_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_wallet_race_lost(&self) {
        self.wallet_races_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mine_found(&self) {
        self.mines_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mine_failed(&self) {
        self.mines_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            claims_sent: self.claims_sent.load(Ordering::Relaxed),
            claims_rejected: self.claims_rejected.load(Ordering::Relaxed),
            claims_unreachable: self.claims_unreachable.load(Ordering::Relaxed),
            rewards_sent_total: self.rewards_sent_total.load(Ordering::Relaxed),
            wallets_created: self.wallets_created.load(Ordering::Relaxed),
            wallet_failures: self.wallet_failures.load(Ordering::Relaxed),
            wallet_races_lost: self.wallet_races_lost.load(Ordering::Relaxed),
            mines_found: self.mines_found.load(Ordering::Relaxed),
            mines_failed: self.mines_failed.load(Ordering::Relaxed),
        }
    }
}

pub fn render_prometheus(snapshot: &MetricsSnapshot, users: u64) -> String {
    let mut out = String::new();
    append_counter(&mut out, "quantum_claims_sent_total", snapshot.claims_sent);
    append_counter(&mut out, "quantum_claims_rejected_total", snapshot.claims_rejected);
    append_counter(
        &mut out,
        "quantum_claims_unreachable_total",
        snapshot.claims_unreachable,
    );
    append_counter(&mut out, "quantum_rewards_sent_total", snapshot.rewards_sent_total);
    append_counter(&mut out, "quantum_wallets_created_total", snapshot.wallets_created);
    append_counter(
        &mut out,
        "quantum_wallet_failures_total",
        snapshot.wallet_failures,
    );
    append_counter(
        &mut out,
        "quantum_wallet_races_lost_total",
        snapshot.wallet_races_lost,
    );
    append_counter(&mut out, "quantum_mines_found_total", snapshot.mines_found);
    append_counter(&mut out, "quantum_mines_failed_total", snapshot.mines_failed);
    append_gauge(&mut out, "quantum_users", users);
    out
}

fn append_counter(out: &mut String, name: &str, value: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn append_gauge(out: &mut String, name: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}
