//! LP token burn checks
//!
//! Liquidity counts as locked once the LP mint supply has been burned
//! down to a near-zero threshold. A pool that looks legitimate but has
//! not burned yet gets a bounded wait: we watch the LP mint and resolve
//! on the first update at or below the threshold.

use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::mint::MintInfo;
use crate::chain::ChainGateway;

/// How a bounded LP burn wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Supply reached the burn threshold
    Locked,
    /// The ceiling elapsed first
    TimedOut,
    /// Shutdown was requested
    Cancelled,
    /// The account watch could not be set up or closed early
    Interrupted(String),
}

impl WaitOutcome {
    pub fn is_locked(&self) -> bool {
        matches!(self, WaitOutcome::Locked)
    }
}

/// LP supply is at or below `threshold` raw units
pub fn is_burned(mint: &MintInfo, threshold: u64) -> bool {
    mint.supply <= threshold
}

/// Poll the LP mint up to `attempts` times. Fetch errors count as "not yet".
pub async fn check_burned(
    gateway: &dyn ChainGateway,
    lp_mint: &Pubkey,
    threshold: u64,
    attempts: u32,
    delay: Duration,
) -> bool {
    for attempt in 1..=attempts.max(1) {
        match gateway.get_account_data(lp_mint).await {
            Ok(data) => match MintInfo::decode(&data) {
                Ok(mint) if is_burned(&mint, threshold) => return true,
                Ok(mint) => debug!("LP {} supply {} (attempt {})", lp_mint, mint.supply, attempt),
                Err(e) => warn!("LP {} decode failed: {}", lp_mint, e),
            },
            Err(e) => warn!("Failed to get LP supply for {}: {}", lp_mint, e),
        }

        if attempt < attempts {
            sleep(delay).await;
        }
    }
    false
}

/// Watch the LP mint until it is burned, `ceiling` elapses, or `cancel` fires.
///
/// The account subscription is dropped on every return path.
pub async fn wait_for_burn(
    gateway: &dyn ChainGateway,
    lp_mint: &Pubkey,
    threshold: u64,
    ceiling: Duration,
    cancel: &CancellationToken,
) -> WaitOutcome {
    info!("Waiting up to {:?} for LP {} to be burned", ceiling, lp_mint);

    let deadline = sleep(ceiling);
    tokio::pin!(deadline);

    let mut updates = tokio::select! {
        biased;
        _ = cancel.cancelled() => return WaitOutcome::Cancelled,
        _ = &mut deadline => return WaitOutcome::TimedOut,
        watch = gateway.watch_account(lp_mint) => match watch {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Cannot watch LP {}: {}", lp_mint, e);
                return WaitOutcome::Interrupted(e.to_string());
            }
        },
    };

    // A burn landing between the last poll and the subscription would be missed otherwise
    if let Ok(data) = gateway.get_account_data(lp_mint).await {
        if matches!(MintInfo::decode(&data), Ok(mint) if is_burned(&mint, threshold)) {
            info!("LP {} burned", lp_mint);
            return WaitOutcome::Locked;
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("LP wait for {} cancelled", lp_mint);
                return WaitOutcome::Cancelled;
            }
            _ = &mut deadline => {
                info!("Timed out waiting for LP {} burn", lp_mint);
                return WaitOutcome::TimedOut;
            }
            update = updates.next() => match update {
                Some(data) => match MintInfo::decode(&data) {
                    Ok(mint) if is_burned(&mint, threshold) => {
                        info!("LP {} burned", lp_mint);
                        return WaitOutcome::Locked;
                    }
                    Ok(mint) => debug!("LP {} changed, supply {}", lp_mint, mint.supply),
                    Err(e) => warn!("LP {} update decode failed: {}", lp_mint, e),
                },
                None => {
                    warn!("LP {} watch closed", lp_mint);
                    return WaitOutcome::Interrupted("account watch closed".into());
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{mint_data, MockGateway};

    const TWO_HOURS: Duration = Duration::from_secs(2 * 60 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_check_burned() {
        let mock = MockGateway::new();
        let lp = Pubkey::new_unique();
        mock.set_account(lp, mint_data(100, 9, None));

        assert!(check_burned(&mock, &lp, 100, 3, Duration::from_millis(700)).await);
        assert_eq!(mock.account_reads(&lp), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_not_burned_uses_all_attempts() {
        let mock = MockGateway::new();
        let lp = Pubkey::new_unique();
        mock.set_account(lp, mint_data(5_000_000, 9, None));

        assert!(!check_burned(&mock, &lp, 100, 3, Duration::from_millis(700)).await);
        assert_eq!(mock.account_reads(&lp), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_on_burn() {
        let mock = std::sync::Arc::new(MockGateway::new());
        let lp = Pubkey::new_unique();
        mock.set_account(lp, mint_data(5_000_000, 9, None));
        let cancel = CancellationToken::new();

        let waiter = {
            let mock = mock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { wait_for_burn(mock.as_ref(), &lp, 100, TWO_HOURS, &cancel).await })
        };

        sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.active_watchers(&lp), 1);
        mock.notify_account(&lp, mint_data(4_000_000, 9, None)).await;
        mock.notify_account(&lp, mint_data(0, 9, None)).await;

        assert_eq!(waiter.await.unwrap(), WaitOutcome::Locked);
        assert_eq!(mock.active_watchers(&lp), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_and_releases_watch() {
        let mock = MockGateway::new();
        let lp = Pubkey::new_unique();
        mock.set_account(lp, mint_data(5_000_000, 9, None));
        let cancel = CancellationToken::new();

        let started = tokio::time::Instant::now();
        let outcome = wait_for_burn(&mock, &lp, 100, TWO_HOURS, &cancel).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() >= TWO_HOURS);
        assert_eq!(mock.active_watchers(&lp), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancelled() {
        let mock = std::sync::Arc::new(MockGateway::new());
        let lp = Pubkey::new_unique();
        mock.set_account(lp, mint_data(5_000_000, 9, None));
        let cancel = CancellationToken::new();

        let waiter = {
            let mock = mock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { wait_for_burn(mock.as_ref(), &lp, 100, TWO_HOURS, &cancel).await })
        };

        sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), WaitOutcome::Cancelled);
        assert_eq!(mock.active_watchers(&lp), 0);
    }
}
