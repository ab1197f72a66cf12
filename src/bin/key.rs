//! kvsstore key tool
//!
//! Builds keys from their fields and decodes raw keys, printing hex.

use clap::{Args as ClapArgs, Parser, Subcommand};
use kvsstore::key::{self, KeyClass, KeyBuf, ObjectIdentity, OmapEntry, NO_GEN, NO_SHARD, NO_SNAP};
use kvsstore::{KvsError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// kvsstore key tool
#[derive(Parser, Debug)]
#[command(name = "kvsstore-key")]
#[command(about = "Build and decode kvsstore device keys")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Superblock key
    Superblock,

    /// Collection key
    Coll {
        /// Collection name
        name: String,
    },

    /// Onode key of an object
    Onode {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// Data-block key of one page of an object
    Data {
        #[command(flatten)]
        object: ObjectArgs,

        /// Block (page) index
        #[arg(short, long, default_value = "0")]
        block: u16,
    },

    /// Journal entry key
    Journal {
        /// Journal index
        index: u64,
    },

    /// Omap entry key (omit the name for the omap header)
    Omap {
        /// Omap object id
        lid: u64,

        /// Entry name
        name: Option<String>,
    },

    /// Omap key-block key
    OmapBlock {
        /// Omap object id
        lid: u64,

        /// Block id
        block: u32,
    },

    /// Decode a hex-encoded key
    Decode {
        /// Key bytes as hex
        hex: String,
    },
}

#[derive(ClapArgs, Debug)]
struct ObjectArgs {
    /// Object name
    name: String,

    /// Pool id
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    pool: i64,

    /// Namespace
    #[arg(short, long, default_value = "")]
    namespace: String,

    /// Locator key
    #[arg(short, long)]
    key: Option<String>,

    /// Shard id
    #[arg(short, long, default_value_t = NO_SHARD, allow_negative_numbers = true)]
    shard: i8,

    /// Placement hash (stored bit-reversed)
    #[arg(long, default_value = "0")]
    hash: u32,

    /// Snapshot id
    #[arg(long, default_value_t = NO_SNAP)]
    snap: u64,

    /// Generation
    #[arg(long, default_value_t = NO_GEN)]
    generation: u64,
}

impl ObjectArgs {
    fn identity(&self) -> ObjectIdentity {
        let mut oid = ObjectIdentity::new(self.pool, self.name.as_bytes())
            .with_shard(self.shard)
            .with_hash(self.hash)
            .with_snap(self.snap)
            .with_generation(self.generation)
            .with_namespace(self.namespace.as_bytes());
        if let Some(key) = &self.key {
            oid = oid.with_key(key.as_bytes());
        }
        oid
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvsstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let key = match command {
        Commands::Superblock => key::superblock_key()?,
        Commands::Coll { name } => key::collection_key(name.as_bytes())?,
        Commands::Onode { object } => key::onode_key(&object.identity())?,
        Commands::Data { object, block } => key::data_key(&object.identity(), block)?,
        Commands::Journal { index } => key::journal_key(index)?,
        Commands::Omap { lid, name } => key::omap_key(lid, name.unwrap_or_default().as_bytes())?,
        Commands::OmapBlock { lid, block } => key::omap_block_key(lid, block)?,
        Commands::Decode { hex } => return decode(&hex),
    };

    tracing::debug!(len = key.len(), "key built");
    println!("{}", key);
    Ok(())
}

fn decode(hex_key: &str) -> Result<()> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| KvsError::MalformedKey(format!("invalid hex: {}", e)))?;
    let key = KeyBuf::from_slice(&bytes)?;

    let class = KeyClass::of(&key)
        .ok_or_else(|| KvsError::MalformedKey("unknown key class".to_string()))?;
    println!("class:      {}", class.name());
    println!("length:     {}", key.len());

    match class {
        KeyClass::Superblock => key::parse_superblock_key(&key)?,
        KeyClass::Collection => {
            let name = key::parse_collection_key(&key)?;
            println!("name:       {}", String::from_utf8_lossy(&name));
        }
        KeyClass::Onode => print_identity(&key::parse_onode_key(&key)?),
        KeyClass::Data => {
            let (oid, block) = key::parse_data_key(&key)?;
            print_identity(&oid);
            println!("block:      {}", block);
        }
        KeyClass::Journal => println!("index:      {}", key::parse_journal_key(&key)?),
        KeyClass::Omap => {
            let (lid, entry) = key::parse_omap_key(&key)?;
            println!("object id:  {}", lid);
            match entry {
                OmapEntry::Header => println!("entry:      <header>"),
                OmapEntry::Entry(name) => {
                    println!("entry:      {}", String::from_utf8_lossy(&name))
                }
            }
        }
        KeyClass::OmapBlock => {
            let (lid, block) = key::parse_omap_block_key(&key)?;
            println!("object id:  {}", lid);
            println!("block id:   {}", block);
        }
    }
    Ok(())
}

fn print_identity(oid: &ObjectIdentity) {
    println!("shard:      {}", oid.shard);
    println!("pool:       {}", oid.pool);
    println!("hash:       {:08x}", oid.hash());
    println!("snap:       {:#x}", oid.snap);
    println!("generation: {:#x}", oid.generation);
    println!("namespace:  {}", String::from_utf8_lossy(&oid.namespace));
    if let Some(key) = oid.key() {
        println!("key:        {}", String::from_utf8_lossy(key));
    }
    println!("name:       {}", String::from_utf8_lossy(&oid.name));
}
