use log::trace;
use smallvec::SmallVec;

use super::*;

/// URI schemes that point to a snapshot. Paths with these schemes omit the channel.
const SNAPSHOT_SCHEMES: [&str; 2] = ["snapshot", "snapshot-private"];

/// Parse any of the accepted forms:
/// - `channel/namespace/version/dataset/table#variable`
/// - `channel/namespace/version/dataset/table`
/// - `channel/namespace/version/dataset`
/// - `snapshot://namespace/version/dataset`
///
/// Any other `scheme://` prefix is dropped, so `data://garden/who/2024/gho` is the
/// same as `garden/who/2024/gho`.
pub(super) fn parse(input: &str) -> Result<CatalogPath> {
    trace!("Parsing catalog path `{input}`");

    let (is_snapshot, rest) = match input.split_once("://") {
        Some((scheme, rest)) => {
            trace!("Strip scheme `{scheme}`");
            (SNAPSHOT_SCHEMES.contains(&scheme), rest)
        }
        None => (false, input),
    };

    let (path, variable) = match rest.split_once('#') {
        Some((path, variable)) => (path, Some(variable.to_owned())),
        None => (rest, None),
    };

    let segments: SmallVec<[&str; 5]> = path.split('/').collect();
    match segments.as_slice() {
        [namespace, version, dataset] if is_snapshot => {
            if variable.is_some() {
                return Err(CatalogPathError::SnapshotVariable(input.to_owned()));
            }
            CatalogPath::validated(
                Channel::Snapshot,
                (*namespace).to_owned(),
                (*version).to_owned(),
                (*dataset).to_owned(),
                None,
                None,
            )
        }
        // Variable is passed on so that it fails as a variable without a table,
        // instead of being dropped.
        [channel, namespace, version, dataset] => CatalogPath::validated(
            channel.parse()?,
            (*namespace).to_owned(),
            (*version).to_owned(),
            (*dataset).to_owned(),
            None,
            variable,
        ),
        [channel, namespace, version, dataset, table] => CatalogPath::validated(
            channel.parse()?,
            (*namespace).to_owned(),
            (*version).to_owned(),
            (*dataset).to_owned(),
            Some((*table).to_owned()),
            variable,
        ),
        _ => {
            trace!("Unexpected number of segments: {}", segments.len());
            Err(CatalogPathError::InvalidFormat(input.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_only() {
        crate::init_log();

        let p = parse("garden/who/2024/gho").unwrap();
        assert_eq!(p.channel(), Channel::Garden);
        assert_eq!(p.table(), None);
        assert_eq!(p.variable(), None);
        assert_eq!(p.to_string(), "garden/who/2024/gho");
    }

    #[test]
    fn table_without_variable() {
        let p = parse("meadow/faostat/2024-03-14/faostat_qcl/faostat_qcl").unwrap();
        assert_eq!(p.table(), Some("faostat_qcl"));
        assert_eq!(p.variable(), None);
    }

    #[test]
    fn snapshot_shorthand() {
        let p = parse("snapshot://un/2024-07-12/un_wpp").unwrap();
        assert_eq!(p.channel(), Channel::Snapshot);
        assert_eq!(p.namespace(), "un");
        assert_eq!(p.version(), "2024-07-12");
        assert_eq!(p.dataset(), "un_wpp");
        assert_eq!(p.table(), None);
        assert_eq!(p.to_string(), "snapshot/un/2024-07-12/un_wpp");

        let private = parse("snapshot-private://un/2024-07-12/un_wpp").unwrap();
        assert_eq!(private, p);
    }

    #[test]
    fn snapshot_with_variable() {
        let err = parse("snapshot://un/2024-07-12/un_wpp#x").unwrap_err();
        assert_eq!(
            err,
            CatalogPathError::SnapshotVariable("snapshot://un/2024-07-12/un_wpp#x".to_owned())
        );
    }

    #[test]
    fn snapshot_scheme_with_channel() {
        let p = parse("snapshot://snapshot/un/2024/un_wpp").unwrap();
        assert_eq!(p, "snapshot/un/2024/un_wpp");
    }

    #[test]
    fn generic_scheme_is_stripped() {
        let p = parse("data://garden/who/2024/gho").unwrap();
        assert_eq!(p, parse("garden/who/2024/gho").unwrap());

        let p = parse("data-private://grapher/who/latest/gho/gho#value").unwrap();
        assert_eq!(p, "grapher/who/latest/gho/gho#value");
    }

    #[test]
    fn generic_scheme_needs_channel() {
        let err = parse("data://who/2024/gho").unwrap_err();
        assert_eq!(err, CatalogPathError::InvalidFormat("data://who/2024/gho".to_owned()));
    }

    #[test]
    fn dataset_with_variable() {
        let err = parse("garden/a/2024/b#v").unwrap_err();
        assert_eq!(err, CatalogPathError::VariableWithoutTable("v".to_owned()));
    }

    #[test]
    fn wrong_segment_count() {
        for input in [
            "",
            "garden",
            "garden/a/2024",
            "garden/a/2024/b/t/u",
            "garden/a/2024/b/t/",
            "snapshot://un/2024",
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err, CatalogPathError::InvalidFormat(input.to_owned()), "{input}");
        }
    }

    #[test]
    fn error_message_shows_shapes() {
        let msg = parse("garden/a").unwrap_err().to_string();
        assert!(msg.contains("channel/namespace/version/dataset`"), "{msg}");
        assert!(msg.contains("table[#variable]"), "{msg}");
        assert!(msg.contains("snapshot://namespace/version/dataset"), "{msg}");
    }

    #[test]
    fn invalid_fields() {
        assert!(matches!(
            parse("bogus/a/2024/b"),
            Err(CatalogPathError::InvalidChannel(_))
        ));
        assert_eq!(
            parse("garden/a/v1/b"),
            Err(CatalogPathError::InvalidVersion("v1".to_owned()))
        );
        assert_eq!(
            parse("garden/a/2024/b/t#"),
            Err(CatalogPathError::InvalidName {
                field: Field::Variable,
                value: String::new(),
            })
        );
        assert_eq!(
            parse("garden/a/2024/b/t#v#w"),
            Err(CatalogPathError::InvalidName {
                field: Field::Variable,
                value: "v#w".to_owned(),
            })
        );
        assert_eq!(
            parse("garden/a/2024//t"),
            Err(CatalogPathError::InvalidName {
                field: Field::Dataset,
                value: String::new(),
            })
        );
    }

    #[test]
    fn from_uri_and_try_from() {
        let uri = "data://garden/who/2024/gho";
        let p = CatalogPath::from_uri(uri).unwrap();
        assert_eq!(CatalogPath::try_from(uri).unwrap(), p);
        assert_eq!(CatalogPath::try_from(uri.to_owned()).unwrap(), p);
        assert_eq!(p.step_uri(), uri);
    }
}
