use crate::fast::Subscription;
use crate::traits::StatStream;
use futures_util::StreamExt;
use shop_models::UpdatedStat;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decodes a raw counter channel subscription into [`UpdatedStat`]s.
///
/// The stream yields one item per well-formed payload and ends when
/// `token` is cancelled or the channel goes away. Malformed payloads are
/// skipped.
pub fn stat_stream(
    subscription: Subscription,
    token: CancellationToken,
) -> StatStream {
    futures_util::stream::unfold(
        (subscription, token),
        |(mut subscription, token)| async move {
            loop {
                let payload = tokio::select! {
                    biased;
                    _ = token.cancelled() => return None,
                    next = subscription.next() => match next {
                        Some(payload) => payload,
                        None => return None,
                    },
                };
                match serde_json::from_str::<UpdatedStat>(&payload) {
                    Ok(stat) => return Some((stat, (subscription, token))),
                    Err(err) => {
                        debug!(error = %err, "skipping malformed stat update")
                    }
                }
            }
        },
    )
    .boxed()
}
