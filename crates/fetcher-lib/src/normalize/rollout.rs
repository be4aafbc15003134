//! Rollout name recovery for controller items

/// Prefix the allocation API puts on Argo rollout controllers
pub const ROLLOUT_PREFIX: &str = "rollout:";

const HASH_LEN: usize = 10;

/// Logical rollout name for a controller item, if it is a rollout.
///
/// `rollout:myapp-7f9c8d1a2b` becomes `myapp`: the prefix is removed, then a
/// trailing `-` followed by exactly ten lowercase hex characters (the pod
/// template hash) is stripped when present.
pub fn rollout_name(controller: &str) -> Option<String> {
    let name = controller.strip_prefix(ROLLOUT_PREFIX)?;
    Some(strip_template_hash(name).to_string())
}

fn strip_template_hash(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() < HASH_LEN + 1 {
        return name;
    }

    let split = bytes.len() - HASH_LEN - 1;
    let (head, tail) = bytes.split_at(split);
    let is_hash = tail[0] == b'-'
        && tail[1..]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b));

    if is_hash {
        // the tail is pure ASCII, so `split` is a char boundary
        &name[..head.len()]
    } else {
        name
    }
}
