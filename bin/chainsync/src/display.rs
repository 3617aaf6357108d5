//! Console output for delivered chain events.

use async_trait::async_trait;
use chainsync_client::SyncConsumer;
use chainsync_common::{ChainPoint, Tip};
use chainsync_ledger::{BlockDescriptor, Datum, MultiAsset, TransactionView, TxInput};
use std::fmt::Display;
use std::io::{self, Write};

/// Prints one line per block and rollback, with transaction details when
/// verbose.
pub struct ConsoleConsumer<W> {
    out: W,
    verbose: bool,
}

impl<W: Write + Send> ConsoleConsumer<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> SyncConsumer for ConsoleConsumer<W> {
    async fn on_block(&mut self, block: BlockDescriptor) -> anyhow::Result<()> {
        writeln!(self.out, "{}", block)?;
        if self.verbose {
            write_details(&mut self.out, &block)?;
        }
        self.out.flush()?;
        Ok(())
    }

    async fn on_rollback(&mut self, point: ChainPoint, tip: Tip) -> anyhow::Result<()> {
        writeln!(
            self.out,
            "roll backward: point = {}, tip = {} (block_no = {})",
            point, tip.point, tip.block_number
        )?;
        Ok(())
    }

    async fn on_range(&mut self, start: ChainPoint, end: ChainPoint) -> anyhow::Result<()> {
        writeln!(self.out, "Start:     {}", short_point(&start))?;
        writeln!(self.out, "End (tip): {}", short_point(&end))?;
        Ok(())
    }
}

fn short_point(point: &ChainPoint) -> String {
    match point.hash() {
        Some(hash) => format!("slot {}, hash {}", point.slot(), hash),
        None => "origin".to_string(),
    }
}

fn write_details<W: Write>(out: &mut W, block: &BlockDescriptor) -> io::Result<()> {
    if let Some(issuer) = &block.issuer_key {
        writeln!(out, "Minted by: {}", issuer.pool_hash())?;
    }
    if block.transactions.is_empty() {
        return writeln!(out);
    }

    writeln!(out, "Transactions:")?;
    for tx in &block.transactions {
        write_transaction(out, tx)?;
    }
    writeln!(out)
}

fn write_transaction<W: Write>(out: &mut W, tx: &TransactionView) -> io::Result<()> {
    writeln!(out, "- Hash: {} ({} bytes)", tx.hash, tx.size)?;
    if tx.has_metadata {
        writeln!(out, "  Metadata: present")?;
    }
    write_inputs(out, "Inputs", &tx.inputs)?;

    if !tx.outputs.is_empty() {
        writeln!(out, "  Outputs:")?;
        for output in &tx.outputs {
            writeln!(out, "  - address = {}, amount = {}", output.address, output.amount)?;
            if let Some(assets) = &output.assets {
                writeln!(out, "  - Assets:")?;
                write_assets(out, assets)?;
            }
            match &output.datum {
                Some(Datum::Hash(hash)) => writeln!(out, "  - Datum hash: {}", hash)?,
                Some(Datum::Inline(value)) => writeln!(out, "  - Datum: {}", value)?,
                None => {}
            }
        }
    }

    write_inputs(out, "Collateral inputs", &tx.collateral)?;
    if tx.has_certificates() {
        writeln!(out, "  Certificates: {}", tx.certificate_count)?;
    }
    if let Some(mint) = &tx.mint {
        writeln!(out, "  Asset mints:")?;
        write_assets(out, mint)?;
    }
    Ok(())
}

fn write_inputs<W: Write>(out: &mut W, label: &str, inputs: &[TxInput]) -> io::Result<()> {
    if inputs.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {}:", label)?;
    for input in inputs {
        writeln!(out, "  - index = {}, id = {}", input.index, input.tx_id)?;
    }
    Ok(())
}

fn write_assets<W: Write, T: Copy + Display>(out: &mut W, assets: &MultiAsset<T>) -> io::Result<()> {
    for (policy, name, amount) in assets.iter() {
        writeln!(out, "    - Asset: name = {}, amount = {}, policy = {}", name, amount, policy)?;
    }
    Ok(())
}
