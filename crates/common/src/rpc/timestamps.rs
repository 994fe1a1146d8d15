//! Block timestamp estimation.
//!
//! Requesting a block for every log entry of a long event history is expensive,
//! so instead we sample at most [`MAX_SAMPLES`] blocks evenly spread over the
//! requested range (plus the range end), fetch them in one batch and
//! linearly interpolate timestamps between consecutive samples.
//!
//! Estimated values are approximations suitable for display and reporting only.
//! Within a pair of consecutive anchors estimates are monotonic, but block time
//! drift between pairs may be visible.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use derive_more::{Display, Error, From};
use time::{error::ComponentRange, OffsetDateTime};
use tracing::debug;

use super::{ChainClient, RpcError};

/// Minimum distance between sampled blocks.
pub const MIN_STEP: u64 = 100;

/// Maximum number of sampled blocks, excluding the final anchor.
pub const MAX_SAMPLES: u64 = 50;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Errors that may occur during timestamp estimation.
#[derive(Debug, Display, Error, From)]
pub enum InterpolationError {
    /// Anchor block lookup failed.
    Rpc(RpcError),

    /// Node response didn't contain one of the requested anchors.
    #[display(fmt = "anchor block {} is missing from the node response", _0)]
    MissingAnchor(#[error(not(source))] u64),

    /// Estimated timestamp is out of the supported date range.
    InvalidTimestamp(ComponentRange),
}

/// Block with a timestamp obtained from a real lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockAnchor {
    /// Block number.
    pub number: u64,

    /// Block timestamp, in seconds.
    pub timestamp: u64,
}

/// Pick anchor block numbers for the provided inclusive range.
///
/// The result is strictly increasing, starts with `min`, ends with `max`
/// and contains at most [`MAX_SAMPLES`] + 1 entries.
pub fn sample_blocks(min: u64, max: u64) -> Vec<u64> {
    let step = MIN_STEP.max((max - min) / MAX_SAMPLES);

    let mut samples: Vec<u64> = (0..MAX_SAMPLES)
        .map(|index| min.saturating_add(step.saturating_mul(index)))
        .take_while(|number| *number < max)
        .collect();

    samples.push(max);
    samples
}

/// Estimate a timestamp of every provided block.
///
/// Performs a single batched lookup of at most [`MAX_SAMPLES`] + 1 blocks,
/// regardless of how many blocks were provided. If any anchor fails to load,
/// the whole estimation fails.
pub async fn estimate<C, I>(
    client: &C,
    blocks: I,
) -> Result<BTreeMap<u64, OffsetDateTime>, InterpolationError>
where
    C: ChainClient + ?Sized,
    I: IntoIterator<Item = u64>,
{
    let blocks: BTreeSet<u64> = blocks.into_iter().collect();

    let (Some(&min), Some(&max)) = (blocks.first(), blocks.last()) else {
        return Ok(BTreeMap::new());
    };

    let samples = sample_blocks(min, max);

    let loaded: HashMap<u64, u64> = client
        .get_blocks(&samples)
        .await?
        .into_iter()
        .map(|block| (block.number, block.timestamp))
        .collect();

    let anchors = samples
        .iter()
        .map(|number| {
            loaded
                .get(number)
                .map(|timestamp| BlockAnchor {
                    number: *number,
                    timestamp: *timestamp,
                })
                .ok_or(InterpolationError::MissingAnchor(*number))
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        blocks = blocks.len(),
        anchors = anchors.len(),
        "estimating block dates"
    );

    blocks
        .into_iter()
        .map(|block| {
            let nanos = interpolate_nanos(&anchors, block);
            Ok((block, OffsetDateTime::from_unix_timestamp_nanos(nanos)?))
        })
        .collect()
}

/// Interpolate a UNIX timestamp, in nanoseconds, of the target block.
///
/// The bracket is the last pair of consecutive anchors whose lower anchor
/// does not exceed the target, capped at the final pair.
/// `anchors` must be non-empty and sorted by block number.
pub fn interpolate_nanos(anchors: &[BlockAnchor], target: u64) -> i128 {
    let [first, ..] = anchors else {
        return 0;
    };

    if anchors.len() == 1 {
        return first.timestamp as i128 * NANOS_PER_SECOND;
    }

    let index = anchors
        .partition_point(|anchor| anchor.number <= target)
        .saturating_sub(1)
        .min(anchors.len() - 2);

    let (a, b) = (anchors[index], anchors[index + 1]);

    let elapsed_blocks = target as i128 - a.number as i128;
    let bracket_time = (b.timestamp as i128 - a.timestamp as i128) * NANOS_PER_SECOND;
    let bracket_blocks = b.number as i128 - a.number as i128;

    a.timestamp as i128 * NANOS_PER_SECOND + elapsed_blocks * bracket_time / bracket_blocks
}
