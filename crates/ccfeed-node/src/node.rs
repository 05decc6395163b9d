use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccfeed_consensus::{
    ChannelSubscriber, ConsensusError, ConsensusSet, ConsensusSetSubscriber, SubscriberHandle,
};
use ccfeed_core::{
    serialize, BlockId, ChangeEntry, Checkpoint, ConsensusChange, CoreError, ProcessedBlock,
};
use ccfeed_store::FileStorage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;

/// One committed mutation as fed to `ccfeed run` and `ccfeed import`, one
/// JSON object per line.
///
/// `blocks` carries the processed blocks the mutation applies that the node
/// has not stored yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(default)]
    pub blocks: Vec<ProcessedBlock>,
    #[serde(default)]
    pub reverted: Vec<BlockId>,
    pub applied: Vec<BlockId>,
}

/// Snapshot of the consensus set printed by `ccfeed status`
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub head: String,
    pub height: u64,
    pub head_timestamp: u64,
    pub change_log_tail: String,
    pub change_count: usize,
}

/// Collects changes up to a limit, cancelling the subscription once full
struct Collector {
    limit: Option<usize>,
    changes: Mutex<Vec<ConsensusChange>>,
    cancel: CancellationToken,
}

impl ConsensusSetSubscriber for Collector {
    fn process_consensus_change(&self, change: &ConsensusChange) {
        let mut changes = self.changes.lock();
        changes.push(change.clone());
        if self.limit.is_some_and(|limit| changes.len() >= limit) {
            self.cancel.cancel();
        }
    }
}

/// A follower of the change feed backed by the on-disk chain database
pub struct Node {
    config: NodeConfig,
    consensus: Arc<ConsensusSet<FileStorage>>,
}

impl Node {
    /// Open the chain database, writing genesis on first use
    pub fn open(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = FileStorage::open(config.chain_db_path())?;
        let genesis = config.to_genesis_config()?;
        let consensus = ConsensusSet::open(storage, &genesis, config.consensus_config())?;

        Ok(Node {
            config,
            consensus: Arc::new(consensus),
        })
    }

    pub fn consensus(&self) -> &Arc<ConsensusSet<FileStorage>> {
        &self.consensus
    }

    pub fn status(&self) -> Result<NodeStatus> {
        let head = self.consensus.current_block()?;
        Ok(NodeStatus {
            head: head.id.to_hex(),
            height: head.height,
            head_timestamp: head.timestamp(),
            change_log_tail: self.consensus.change_log_tail()?.to_hex(),
            change_count: self.consensus.change_count(),
        })
    }

    /// Every change after `from`, at most `limit` of them
    pub fn changes(&self, from: Checkpoint, limit: Option<usize>) -> Result<Vec<ConsensusChange>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let cancel = CancellationToken::new();
        let collector = Arc::new(Collector {
            limit,
            changes: Mutex::new(Vec::new()),
            cancel: cancel.clone(),
        });
        let handle: SubscriberHandle = collector.clone();

        match self.consensus.subscribe(handle.clone(), from, &cancel) {
            Ok(()) => self.consensus.unsubscribe(&handle)?,
            // the limit was reached
            Err(ConsensusError::SubscribeAborted) => {}
            Err(e) => return Err(e.into()),
        }

        let changes = std::mem::take(&mut *collector.changes.lock());
        Ok(changes)
    }

    /// Store the record's blocks and commit its mutation
    pub fn apply(&self, record: MutationRecord) -> Result<ChangeEntry, ConsensusError> {
        apply_mutation(&self.consensus, record)
    }

    /// Apply every mutation in a JSON-lines file, in order
    pub fn import(&self, path: &Path) -> Result<Vec<ChangeEntry>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading mutations from {}", path.display()))?;

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let Some(record) = parse_record(line)
                .with_context(|| format!("{}:{}", path.display(), index + 1))?
            else {
                continue;
            };
            entries.push(self.apply(record)?);
        }
        Ok(entries)
    }

    /// Follow the feed from the configured checkpoint while applying the
    /// mutations read from stdin, until Ctrl-C or end of input
    pub async fn run(self) -> Result<()> {
        let input = BufReader::new(tokio::io::stdin());
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_with(input, shutdown).await?;
        Ok(())
    }

    /// Drive the follower from `input` until it ends or `shutdown`
    /// resolves. Returns the number of changes the follower received.
    pub async fn run_with<R, F>(self, input: R, shutdown: F) -> Result<u64>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let checkpoint = self.config.follow_checkpoint()?;
        let status = self.status()?;
        info!(
            "Starting ccfeed node at height {} ({} changes), following from {}",
            status.height, status.change_count, checkpoint
        );

        let (subscriber, changes) = ChannelSubscriber::new(self.config.channel_capacity);
        let handle: SubscriberHandle = subscriber;
        let follower = tokio::spawn(follow(changes));

        let cancel = CancellationToken::new();
        let mut subscribing = {
            let consensus = Arc::clone(self.consensus());
            let handle = handle.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || consensus.subscribe(handle, checkpoint, &cancel))
        };

        let interrupted = tokio::select! {
            joined = &mut subscribing => {
                if let Err(e) = joined? {
                    if e.requires_rescan() {
                        warn!("Checkpoint {} is unknown; set follow_from to \"beginning\"", checkpoint);
                    }
                    return Err(e.into());
                }
                false
            }
            _ = &mut shutdown => true,
        };

        if interrupted {
            cancel.cancel();
            match subscribing.await? {
                Ok(()) | Err(ConsensusError::SubscribeAborted) => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            info!("Caught up, applying mutations from input");
            let mut lines = input.lines();
            let mut line_number = 0u64;
            loop {
                let line = tokio::select! {
                    line = lines.next_line() => line?,
                    _ = &mut shutdown => break,
                };
                let Some(line) = line else {
                    info!("End of input after {} lines", line_number);
                    break;
                };
                line_number += 1;

                let record = match parse_record(&line) {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Skipping input line {}: {}", line_number, e);
                        continue;
                    }
                };

                let consensus = Arc::clone(self.consensus());
                match tokio::task::spawn_blocking(move || apply_mutation(&consensus, record)).await? {
                    Ok(entry) => debug!("Applied line {} as change {}", line_number, entry.id),
                    Err(e) => warn!("Mutation on input line {} failed: {}", line_number, e),
                }
            }
        }

        info!("Shutting down");
        let consensus = Arc::clone(self.consensus());
        tokio::task::spawn_blocking(move || -> Result<(), ConsensusError> {
            consensus.unsubscribe(&handle)?;
            consensus.close();
            Ok(())
        })
        .await??;

        let delivered = follower.await?;
        info!("Node stopped after following {} changes", delivered);
        Ok(delivered)
    }
}

fn apply_mutation(
    consensus: &ConsensusSet<FileStorage>,
    record: MutationRecord,
) -> Result<ChangeEntry, ConsensusError> {
    for block in &record.blocks {
        consensus.add_block(block)?;
    }
    consensus.commit_mutation(record.reverted, record.applied)
}

/// Blank lines yield `None`
fn parse_record(line: &str) -> Result<Option<MutationRecord>, CoreError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serialize::from_json(line).map(Some)
}

async fn follow(mut changes: mpsc::Receiver<ConsensusChange>) -> u64 {
    let mut delivered = 0;
    while let Some(change) = changes.recv().await {
        delivered += 1;
        info!(
            "Change {}: -{} +{} blocks, {} coin diffs, {} block stake diffs, min child timestamp {}",
            change.id,
            change.reverted_blocks.len(),
            change.applied_blocks.len(),
            change.coin_output_diffs.len(),
            change.block_stake_output_diffs.len(),
            change.minimum_valid_child_timestamp
        );
    }
    delivered
}
