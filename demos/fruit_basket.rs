use chained_hash_table::{ChainedHashTable, Error, Value};

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_millis()
        .init();

    let mut table = ChainedHashTable::new(5)?;
    table.insert(Value::from("apple"), Value::from(3))?;
    table.insert(Value::from("banana"), Value::from(2))?;
    table.insert(Value::from("cherry"), Value::from(5))?;
    table.insert(
        Value::from(12),
        Value::from(vec![Value::from(1), Value::from(2), Value::from(3)]),
    )?;
    println!("{} ({} entries, load factor {:.2})", table, table.len(), table.load_factor());

    let zxc = Value::from("zxc");
    println!("{} {}", table.get_or_placeholder(&zxc), table.contains(&zxc));

    table.insert(Value::from("apple"), Value::from(15))?;
    println!("apple -> {}", table.search(&Value::from("apple"))?);

    table.remove(&Value::from("banana"))?;
    println!("{} ({} entries)", table, table.len());

    // Lists are mutable, so they cannot be keys.
    let list = Value::from(vec![Value::from(1)]);
    match table.insert(list.clone(), Value::None) {
        Err(Error::UnhashableKey) => println!("{} is not a valid key", list),
        other => println!("unexpected: {:?}", other),
    }

    for bucket in 0..table.capacity() {
        println!("bucket {}: {} entries", bucket, table.chain_len(bucket).unwrap_or(0));
    }
    Ok(())
}
