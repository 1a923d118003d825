use crate::{
    db::{Db, query::Filter, record::Record},
    dispatch::{DispatchError, Operation},
    error::InternalError,
    ledger::Ledger,
};
use serde::Serialize;

pub(super) fn run<L: Ledger + ?Sized>(
    op: Operation,
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    match op {
        Operation::Create => create(db, args),
        Operation::Read => read(db, args),
        Operation::Update => update(db, args),
        Operation::Delete => delete(db, args),
        Operation::RangeQuery => range_query(db, args),
        Operation::PrefixQuery => prefix_query(db, args),
        Operation::PredicateQuery => predicate_query(db, args),
        Operation::History => history(db, args),
        Operation::QueryByField => query_by_field(db, args),
        Operation::UpdateByIndex => update_by_index(db, args),
        Operation::AuditIndex => audit_index(db, args),
    }
}

fn exactly(op: Operation, args: &[String], n: usize) -> Result<(), DispatchError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(DispatchError::Arity {
            op,
            expected: n.to_string(),
            got: args.len(),
        })
    }
}

fn at_least(op: Operation, args: &[String], n: usize) -> Result<(), DispatchError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(DispatchError::Arity {
            op,
            expected: format!("at least {n}"),
            got: args.len(),
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, InternalError> {
    serde_json::to_vec(value).map_err(|err| InternalError::serialize_internal(err.to_string()))
}

fn create<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    let record = Record::from_args(db.model(), args)?;
    db.records().create(record)?;

    // mutations succeed with an empty payload
    Ok(Vec::new())
}

// Stored bytes go back verbatim.
fn read<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::Read, args, 1)?;
    let (_, bytes) = db.records().read_encoded(&args[0])?;

    Ok(bytes)
}

fn update<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    let record = Record::from_args(db.model(), args)?;
    db.records().update(record)?;

    Ok(Vec::new())
}

fn delete<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::Delete, args, 1)?;
    db.records().delete(&args[0])?;

    Ok(Vec::new())
}

fn range_query<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::RangeQuery, args, 2)?;

    db.query().range(&args[0], &args[1])?.to_json()
}

// index name, then leading attribute values
fn prefix_query<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    at_least(Operation::PrefixQuery, args, 1)?;

    db.query().prefix_query(&args[0], &args[1..])?.to_json()
}

fn predicate_query<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::PredicateQuery, args, 1)?;
    let filter = Filter::parse(&args[0])?;

    db.query().predicate(&filter)?.to_json()
}

fn history<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::History, args, 1)?;

    db.history().render(&args[0])
}

fn query_by_field<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::QueryByField, args, 2)?;

    db.query().query_by_field(&args[0], &args[1])?.to_json()
}

///
/// UpdateByIndexOutput
///

#[derive(Serialize)]
struct UpdateByIndexOutput {
    updated: usize,
}

// field, leading attribute values..., new value
fn update_by_index<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    at_least(Operation::UpdateByIndex, args, 2)?;
    let (field, rest) = args.split_at(1);
    let (prefix, value) = rest.split_at(rest.len() - 1);

    let updated = db
        .records()
        .update_by_index(prefix, &field[0], &value[0])?;

    to_json(&UpdateByIndexOutput { updated })
}

fn audit_index<L: Ledger + ?Sized>(
    db: &mut Db<'_, L>,
    args: &[String],
) -> Result<Vec<u8>, InternalError> {
    exactly(Operation::AuditIndex, args, 0)?;
    let audit = db.indexes().audit(db.ledger())?;

    to_json(&audit)
}

#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        dispatch::Dispatcher,
        error::{ErrorClass, ErrorOrigin},
        ledger::memory::MemoryLedger,
        model::Preset,
        test_support::{args, student_args},
    };
    use serde_json::Value as Json;

    fn marbles() -> (Dispatcher, MemoryLedger) {
        let dispatcher = Dispatcher::from_config(&Config::for_preset(Preset::Marble)).unwrap();
        let mut ledger = MemoryLedger::with_rich_queries();
        for row in [
            ["m1", "red", "35", "tom"],
            ["m2", "blue", "50", "tom"],
            ["m3", "red", "10", "jerry"],
        ] {
            dispatcher.invoke(&mut ledger, "create", &args(&row)).unwrap();
        }

        (dispatcher, ledger)
    }

    fn json(bytes: &[u8]) -> Json {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn read_returns_stored_bytes() {
        let (dispatcher, mut ledger) = marbles();
        let out = dispatcher.invoke(&mut ledger, "read", &args(&["m1"])).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"docType":"marble","color":"red","name":"m1","owner":"tom","size":35}"#
        );
    }

    #[test]
    fn create_and_update_validate_arity() {
        let (dispatcher, mut ledger) = marbles();

        for op in ["create", "update"] {
            let err = dispatcher
                .invoke(&mut ledger, op, &args(&["m9", "red"]))
                .unwrap_err();
            assert_eq!(err.class, ErrorClass::InvalidArgument);
        }
        let err = dispatcher.invoke(&mut ledger, "read", &[]).unwrap_err();
        assert_eq!(err.origin, ErrorOrigin::Dispatch);
    }

    #[test]
    fn prefix_query_takes_index_and_leading_values() {
        let (dispatcher, mut ledger) = marbles();
        let out = dispatcher
            .invoke(&mut ledger, "prefix-query", &args(&["color~name", "red"]))
            .unwrap();

        let rows = json(&out);
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["Key"], "m1");
        assert_eq!(rows[1]["Record"]["owner"], "jerry");
    }

    #[test]
    fn update_by_index_reports_count() {
        let (dispatcher, mut ledger) = marbles();
        let out = dispatcher
            .invoke(&mut ledger, "update-by-index", &args(&["owner", "red", "alice"]))
            .unwrap();

        assert_eq!(json(&out), serde_json::json!({"updated": 2}));

        let owned = dispatcher
            .invoke(&mut ledger, "query-by-field", &args(&["owner", "alice"]))
            .unwrap();
        assert_eq!(json(&owned).as_array().unwrap().len(), 2);
    }

    #[test]
    fn update_by_index_with_no_prefix_touches_every_record() {
        let (dispatcher, mut ledger) = marbles();
        let out = dispatcher
            .invoke(&mut ledger, "update-by-index", &args(&["owner", "bob"]))
            .unwrap();

        assert_eq!(json(&out)["updated"], 3);
    }

    #[test]
    fn audit_index_renders_report() {
        let (dispatcher, mut ledger) = marbles();
        let out = dispatcher.invoke(&mut ledger, "audit-index", &[]).unwrap();

        let audit = json(&out);
        assert_eq!(audit["entries"], 3);
        assert_eq!(audit["records"], 3);
        assert_eq!(audit["dangling"], serde_json::json!([]));
    }

    #[test]
    fn predicate_query_rejects_malformed_filter() {
        let (dispatcher, mut ledger) = marbles();
        let err = dispatcher
            .invoke(&mut ledger, "predicate-query", &args(&["{\"selector\":"]))
            .unwrap_err();

        assert_eq!(err.class, ErrorClass::InvalidArgument);
        assert_eq!(err.origin, ErrorOrigin::Query);
    }

    #[test]
    fn student_update_checks_score_sum() {
        let dispatcher = Dispatcher::from_config(&Config::for_preset(Preset::Student)).unwrap();
        let mut ledger = MemoryLedger::new();

        // create does not check the sum
        dispatcher
            .invoke(&mut ledger, "initStudent", &student_args("s1", 1.0))
            .unwrap();

        let err = dispatcher
            .invoke(&mut ledger, "updateStudent", &student_args("s1", 2.0))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::ValidationError);

        dispatcher
            .invoke(&mut ledger, "updateStudent", &student_args("s1", 536.5))
            .unwrap();
    }
}
