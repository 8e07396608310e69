use clap::Parser;
use direct_cache::CacheMap;
use direct_cache::CacheTableBuilder;
use direct_cache::policy::First;
use direct_cache::policy::LogDiscard;

#[derive(Parser, Debug)]
struct Args {
    /// Requested capacity, rounded up to a power of two.
    #[arg(short = 'c', long = "capacity", default_value_t = 80_000)]
    capacity: usize,

    /// Number of sequential integer keys to insert.
    #[arg(short = 'n', long = "inserts", default_value_t = 141_000)]
    inserts: u32,

    /// Log table construction at debug level.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log every eviction (implies --verbose).
    #[arg(long)]
    log_evictions: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose || args.log_evictions {
        simplelog::TermLogger::init(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )?;
    }

    println!("Creating cache with capacity: {}", args.capacity);

    let (len, collisions) = if args.log_evictions {
        let builder =
            CacheTableBuilder::with_key_extract(args.capacity, First).with_discard(LogDiscard);
        let mut map: CacheMap<i32, i32, _, _> = CacheMap::from_builder(builder, -1)?;
        println!("Bucket count: {}", map.bucket_count());
        for i in 0..args.inserts as i32 {
            map.insert(i, i + 1)?;
        }
        map.stats().print();
        (map.len(), map.num_collisions())
    } else {
        let mut map: CacheMap<i32, i32> = CacheMap::new(args.capacity, -1)?;
        println!("Bucket count: {}", map.bucket_count());
        for i in 0..args.inserts as i32 {
            map.insert(i, i + 1)?;
        }
        map.stats().print();
        (map.len(), map.num_collisions())
    };

    println!("N: {len}");
    println!(
        "Collisions: {} ( {:.2} % )",
        collisions,
        collisions as f64 / args.inserts.max(1) as f64 * 100.0
    );

    println!();
    println!("String keys:");

    let mut words: CacheMap<String, f64> = CacheMap::new(args.capacity, String::new())?;
    words.insert("ciao".to_string(), 11.0)?;
    *words.find_or_insert("prova".to_string())? = 1.5;
    *words.find_or_insert("hola".to_string())? = 3.1;
    *words.find_or_insert("2".to_string())? = 2.2;

    // Looking up through the upsert claims the slot with a default value.
    let missing = *words.find_or_insert("missing key".to_string())?;
    println!("upserted missing key -> {missing}");

    for (key, value) in words.iter() {
        println!("map[ {key} ] = {value}");
    }
    println!("Items: {}", words.len());
    println!("Collisions: {}", words.num_collisions());
    println!(
        "size_of::<CacheMap<String, f64>>(): {}",
        std::mem::size_of::<CacheMap<String, f64>>()
    );

    Ok(())
}
