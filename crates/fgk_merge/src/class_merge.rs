//! Structural merging of two versions of the same class.
//!
//! The client version is the base. Interfaces, inner-class rows, fields, and
//! methods are aligned list-wise against the server version; anything only
//! one platform has is carried into the result and stamped with the marker
//! annotation so runtime code can tell it apart. Server-exclusive members are
//! transplanted into the client pool, constants, bytecode, and all.

use fgk_classfile::{annotations, inner_classes, ClassFile, ConstantPool, Member, Transplanter};
use tracing::{debug, warn};

use crate::align::{align, Aligned};
use crate::error::Result;
use crate::{ExclusiveSide, SIDE_ENUM_DESC, SIDE_ONLY_DESC};

/// Merges the server version of a class into the client version and returns
/// the re-encoded bytes. Mismatches that cannot be reconciled structurally
/// (flags, superclass, class version) keep the client's value and are pushed
/// onto `review`.
pub(crate) fn merge_class(
    client: &[u8],
    server: &[u8],
    review: &mut Vec<String>,
) -> Result<Vec<u8>> {
    let mut merged = ClassFile::parse(client)?;
    let server = ClassFile::parse(server)?;
    let name = merged.name()?.to_owned();

    if merged.access != server.access {
        let note = format!(
            "{name}: class access differs between platforms ({:#06x} client, {:#06x} server), keeping client",
            merged.access.bits(),
            server.access.bits()
        );
        warn!("{note}");
        review.push(note);
    }
    if merged.super_name()? != server.super_name()? {
        let note = format!("{name}: superclass differs between platforms, keeping client");
        warn!("{note}");
        review.push(note);
    }
    if (merged.major, merged.minor) != (server.major, server.minor) {
        let note = format!(
            "{name}: class file version differs ({}.{} client, {}.{} server), keeping client",
            merged.major, merged.minor, server.major, server.minor
        );
        warn!("{note}");
        review.push(note);
    }

    merge_interfaces(&mut merged, &server)?;
    merge_inner_classes(&mut merged, &server)?;
    merged.fields = merge_members(&mut merged.pool, &merged.fields, &server.pool, &server.fields)?;
    merged.methods =
        merge_members(&mut merged.pool, &merged.methods, &server.pool, &server.methods)?;

    Ok(merged.to_bytes()?)
}

/// Re-encodes a class that exists on only one platform with the marker
/// annotation attached at class level.
pub(crate) fn annotate_exclusive(bytes: &[u8], side: ExclusiveSide) -> Result<Vec<u8>> {
    let mut class = ClassFile::parse(bytes)?;
    annotations::add_enum_annotation(
        &mut class.pool,
        &mut class.attributes,
        SIDE_ONLY_DESC,
        SIDE_ENUM_DESC,
        side.constant(),
    )?;
    Ok(class.to_bytes()?)
}

fn merge_interfaces(merged: &mut ClassFile, server: &ClassFile) -> Result<()> {
    let client_names: Vec<String> = merged
        .interface_names()?
        .into_iter()
        .map(str::to_owned)
        .collect();
    let server_names: Vec<String> = server
        .interface_names()?
        .into_iter()
        .map(str::to_owned)
        .collect();

    let mut out = Vec::with_capacity(client_names.len().max(server_names.len()));
    for step in align(&client_names, &server_names) {
        match step {
            Aligned::Both(i, _) | Aligned::Left(i) => out.push(merged.interfaces[i]),
            Aligned::Right(j) => {
                debug!(interface = %server_names[j], "carrying server-only interface");
                out.push(merged.pool.intern_class(&server_names[j])?);
            }
        }
    }
    merged.interfaces = out;
    Ok(())
}

fn merge_inner_classes(merged: &mut ClassFile, server: &ClassFile) -> Result<()> {
    let Some(server_index) = server.attribute(inner_classes::ATTRIBUTE_NAME) else {
        return Ok(());
    };
    let server_entries = inner_classes::parse(&server.pool, &server.attributes[server_index])?;

    let client_index = merged.attribute(inner_classes::ATTRIBUTE_NAME);
    let client_entries = match client_index {
        Some(index) => inner_classes::parse(&merged.pool, &merged.attributes[index])?,
        None => Vec::new(),
    };

    let client_names: Vec<&str> = client_entries.iter().map(|e| e.inner.as_str()).collect();
    let server_names: Vec<&str> = server_entries.iter().map(|e| e.inner.as_str()).collect();

    let mut out = Vec::with_capacity(client_names.len().max(server_names.len()));
    for step in align(&client_names, &server_names) {
        match step {
            Aligned::Both(i, _) | Aligned::Left(i) => out.push(client_entries[i].clone()),
            Aligned::Right(j) => out.push(server_entries[j].clone()),
        }
    }
    if out == client_entries {
        return Ok(());
    }

    let attr = inner_classes::encode(&mut merged.pool, &out)?;
    match client_index {
        Some(index) => merged.attributes[index] = attr,
        None => merged.attributes.push(attr),
    }
    Ok(())
}

/// Aligns two member lists by `name + descriptor` and produces the merged
/// list against `pool`. Exclusive members get the marker annotation.
fn merge_members(
    pool: &mut ConstantPool,
    client: &[Member],
    server_pool: &ConstantPool,
    server: &[Member],
) -> Result<Vec<Member>> {
    let client_keys = member_keys(client, pool)?;
    let server_keys = member_keys(server, server_pool)?;

    let mut merged = Vec::with_capacity(client.len().max(server.len()));
    let mut client_only = Vec::new();
    let mut server_only = Vec::new();
    {
        let mut transplanter = Transplanter::new(server_pool, pool);
        for step in align(&client_keys, &server_keys) {
            match step {
                Aligned::Both(i, _) => merged.push(client[i].clone()),
                Aligned::Left(i) => {
                    debug!(member = %client_keys[i], "client-only member");
                    client_only.push(merged.len());
                    merged.push(client[i].clone());
                }
                Aligned::Right(j) => {
                    debug!(member = %server_keys[j], "transplanting server-only member");
                    server_only.push(merged.len());
                    merged.push(transplanter.transplant_member(&server[j])?);
                }
            }
        }
    }

    for (indices, side) in [
        (client_only, ExclusiveSide::Client),
        (server_only, ExclusiveSide::Server),
    ] {
        for index in indices {
            annotations::add_enum_annotation(
                pool,
                &mut merged[index].attributes,
                SIDE_ONLY_DESC,
                SIDE_ENUM_DESC,
                side.constant(),
            )?;
        }
    }
    Ok(merged)
}

fn member_keys(members: &[Member], pool: &ConstantPool) -> Result<Vec<String>> {
    members
        .iter()
        .map(|member| Ok(member.key(pool)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use fgk_classfile::{AccessFlags, Attribute, ClassFile, ConstantPool, Member};

    use super::*;

    fn field(pool: &mut ConstantPool, name: &str, desc: &str) -> Member {
        Member {
            access: AccessFlags::PUBLIC,
            name: pool.intern_utf8(name).unwrap(),
            desc: pool.intern_utf8(desc).unwrap(),
            attributes: Vec::new(),
        }
    }

    fn class(name: &str, field_names: &[&str], interfaces: &[&str]) -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(name).unwrap();
        let super_class = pool.intern_class("java/lang/Object").unwrap();
        let interfaces = interfaces
            .iter()
            .map(|itf| pool.intern_class(itf).unwrap())
            .collect();
        let fields = field_names
            .iter()
            .map(|f| field(&mut pool, f, "I"))
            .collect();
        let class = ClassFile {
            minor: 0,
            major: 52,
            pool,
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class,
            super_class,
            interfaces,
            fields,
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        class.to_bytes().unwrap()
    }

    fn side_of(pool: &ConstantPool, attributes: &[Attribute]) -> Option<String> {
        annotations::enum_annotation_value(pool, attributes, SIDE_ONLY_DESC).unwrap()
    }

    #[test]
    fn exclusive_members_are_carried_and_marked() {
        let client = class("a", &["shared", "clientish"], &[]);
        let server = class("a", &["shared", "serverish"], &[]);

        let mut review = Vec::new();
        let merged = merge_class(&client, &server, &mut review).unwrap();
        assert!(review.is_empty());

        let merged = ClassFile::parse(&merged).unwrap();
        let names: Vec<&str> = merged
            .fields
            .iter()
            .map(|f| f.name(&merged.pool).unwrap())
            .collect();
        assert_eq!(names, vec!["shared", "clientish", "serverish"]);

        assert_eq!(side_of(&merged.pool, &merged.fields[0].attributes), None);
        assert_eq!(
            side_of(&merged.pool, &merged.fields[1].attributes).as_deref(),
            Some("CLIENT")
        );
        assert_eq!(
            side_of(&merged.pool, &merged.fields[2].attributes).as_deref(),
            Some("SERVER")
        );
    }

    #[test]
    fn server_only_interfaces_are_added() {
        let client = class("a", &[], &["jy"]);
        let server = class("a", &[], &["jy", "qn"]);

        let mut review = Vec::new();
        let merged = merge_class(&client, &server, &mut review).unwrap();
        let merged = ClassFile::parse(&merged).unwrap();
        assert_eq!(merged.interface_names().unwrap(), vec!["jy", "qn"]);
    }

    #[test]
    fn structural_mismatches_are_flagged_for_review() {
        let client = class("a", &[], &[]);
        let mut server = ClassFile::parse(&class("a", &[], &[])).unwrap();
        server.major = 51;
        let server = server.to_bytes().unwrap();

        let mut review = Vec::new();
        merge_class(&client, &server, &mut review).unwrap();
        assert_eq!(review.len(), 1);
        assert!(review[0].contains("class file version differs"));
    }

    #[test]
    fn class_level_marking() {
        let bytes = class("cs", &[], &[]);
        let marked = annotate_exclusive(&bytes, ExclusiveSide::Server).unwrap();
        let class = ClassFile::parse(&marked).unwrap();
        assert_eq!(
            side_of(&class.pool, &class.attributes).as_deref(),
            Some("SERVER")
        );
    }
}
