use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use xaba_core::format::TableLayout;
use xaba_core::{AssemblyStore, NamedPayload, StoreSet};

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSummary {
    path: PathBuf,
    store_id: u32,
    version: u32,
    local_entry_count: u32,
    global_entry_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayloadEntry {
    name: String,
    kind: String,
    hash: String,
    size: usize,
    compressed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    stores: Vec<StoreSummary>,
    payloads: Vec<PayloadEntry>,
}

pub struct Unpacker {
    paths: Vec<PathBuf>,
    stores: Vec<AssemblyStore>,
    payloads: Vec<NamedPayload>,
}

impl Unpacker {
    pub fn new(inputs: &[PathBuf]) -> Result<Self> {
        let mut stores = Vec::with_capacity(inputs.len());
        for path in inputs {
            let store = AssemblyStore::from_file(path)
                .with_context(|| format!("unable to load assembly store: {:?}", path))?;
            log::info!(
                "loaded {:?}: store_id={}, {} descriptors, {} hash entries",
                path,
                store.store_id(),
                store.descriptors().len(),
                store.hashes64().len()
            );
            stores.push(store);
        }

        Ok(Self {
            paths: inputs.to_vec(),
            stores,
            payloads: Vec::new(),
        })
    }

    /// One file is extracted on its own; several files are resolved as a set around store 0.
    pub fn extract(&mut self) -> Result<()> {
        self.payloads = match self.stores.as_slice() {
            [store] => xaba_core::extract(store)?,
            stores => StoreSet::new(stores.iter().cloned())?.extract()?,
        };
        log::info!("extracted {} payloads", self.payloads.len());

        Ok(())
    }

    pub fn payloads(&self) -> &[NamedPayload] {
        &self.payloads
    }

    pub fn list(&self, out: &mut impl Write) -> Result<()> {
        for (path, store) in self.paths.iter().zip(&self.stores) {
            let header = store.header();
            let layout: &TableLayout = store.layout();
            writeln!(out, "{}", path.display())?;
            writeln!(
                out,
                "  version={} store_id={} local_entry_count={} global_entry_count={}",
                header.version, header.store_id, header.local_entry_count, header.global_entry_count
            )?;
            writeln!(
                out,
                "  descriptors@{} hash32@{} hash64@{} data@{} ({} bytes)",
                layout.descriptors,
                layout.hashes32,
                layout.hashes64,
                layout.data_start,
                store.data().len()
            )?;

            for (i, d) in store.descriptors().iter().enumerate() {
                writeln!(
                    out,
                    "  [{:4}] data={:#x}+{} debug={:#x}+{} config={:#x}+{}",
                    i,
                    d.data_offset,
                    d.data_size,
                    d.debug_data_offset,
                    d.debug_data_size,
                    d.config_data_offset,
                    d.config_data_size
                )?;
            }

            for (h32, h64) in store.hashes32().iter().zip(store.hashes64()) {
                writeln!(
                    out,
                    "  {:08x} {:016x} -> store {} descriptor {} (mapping {})",
                    h32.hash, h64.hash, h64.store_id, h64.local_store_index, h64.mapping_index
                )?;
            }
        }

        Ok(())
    }

    pub fn write_payloads(&self, path: impl AsRef<Path>) -> Result<()> {
        let output = path.as_ref();
        if !output.exists() {
            std::fs::create_dir_all(output)?;
        }

        for payload in &self.payloads {
            let target = output.join(&payload.name);
            std::fs::write(&target, &payload.bytes)
                .with_context(|| format!("unable to write : {:?}", target))?;
            log::debug!("wrote {:?} ({} bytes)", target, payload.bytes.len());
        }

        Ok(())
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            stores: self
                .paths
                .iter()
                .zip(&self.stores)
                .map(|(path, store)| StoreSummary {
                    path: path.clone(),
                    store_id: store.header().store_id,
                    version: store.header().version,
                    local_entry_count: store.header().local_entry_count,
                    global_entry_count: store.header().global_entry_count,
                })
                .collect(),
            payloads: self
                .payloads
                .iter()
                .map(|p| PayloadEntry {
                    name: p.name.clone(),
                    kind: p.kind.to_string(),
                    hash: format!("{:016x}", p.hash),
                    size: p.bytes.len(),
                    compressed: p.compressed,
                })
                .collect(),
        }
    }

    pub fn write_manifest(&self, path: impl AsRef<Path>) -> Result<()> {
        let manifest_path = path.as_ref().join("manifest.yaml");
        let mut writer = std::fs::File::create(&manifest_path)?;
        serde_yaml::to_writer(&mut writer, &self.manifest())?;
        log::info!("wrote manifest {:?}", manifest_path);

        Ok(())
    }
}

/// Unpack Xamarin assembly stores (assemblies.blob and its per-ABI siblings)
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Store files; pass every store of an application to resolve cross-store entries
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory for the extracted payloads
    #[arg(short, long, required_unless_present = "list")]
    output: Option<PathBuf>,

    /// Also write manifest.yaml into the output directory
    #[arg(short, long)]
    manifest: bool,

    /// Print the store tables instead of extracting
    #[arg(short, long)]
    list: bool,
}

fn run(args: Args) -> Result<()> {
    let mut unpacker = Unpacker::new(&args.input)?;

    if args.list {
        return unpacker.list(&mut std::io::stdout().lock());
    }

    let Some(output) = args.output else {
        anyhow::bail!("no output directory given");
    };

    unpacker.extract()?;
    unpacker.write_payloads(&output)?;
    if args.manifest {
        unpacker.write_manifest(&output)?;
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
