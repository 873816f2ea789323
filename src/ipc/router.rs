use crate::murmur::{AclEntry, AclSnapshot, AdminServer, NameMap, UserInfoField, UserInfoMap};
use serde_json::{json, Map, Value};

use super::failure::DispatchError;
use super::params::{
    array, bool_or, int_or, object, required_int, required_string, string_or, Params,
};

// ============================================================================
// Method Table
// ============================================================================

/// The fixed set of operations the bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    RegisterUser,
    UnregisterUser,
    UpdateRegistration,
    GetRegisteredUsers,
    SetAcl,
    GetAcl,
    GetRegistration,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::RegisterUser,
        Method::UnregisterUser,
        Method::UpdateRegistration,
        Method::GetRegisteredUsers,
        Method::SetAcl,
        Method::GetAcl,
        Method::GetRegistration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::RegisterUser => "registerUser",
            Method::UnregisterUser => "unregisterUser",
            Method::UpdateRegistration => "updateRegistration",
            Method::GetRegisteredUsers => "getRegisteredUsers",
            Method::SetAcl => "setACL",
            Method::GetAcl => "getACL",
            Method::GetRegistration => "getRegistration",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Runs one operation against the server. Unknown methods fail before any
/// remote call is made.
pub fn dispatch(
    server: &mut dyn AdminServer,
    method: &str,
    params: &Params,
) -> Result<Value, DispatchError> {
    let method =
        Method::from_name(method).ok_or_else(|| DispatchError::UnknownMethod(method.to_string()))?;

    match method {
        Method::RegisterUser => handle_register_user(server, params),
        Method::UnregisterUser => {
            let user_id = required_int(params, "userId")?;
            server.unregister_user(user_id)?;
            Ok(Value::Null)
        }
        Method::UpdateRegistration => handle_update_registration(server, params),
        Method::GetRegisteredUsers => {
            let filter = string_or(params, "filter", "")?;
            let users = server.get_registered_users(&filter)?;
            Ok(name_map_to_json(users))
        }
        Method::SetAcl => handle_set_acl(server, params),
        Method::GetAcl => {
            let channel_id = required_int(params, "channelId")?;
            let snapshot = server.get_acl(channel_id)?;
            Ok(acl_snapshot_to_json(snapshot))
        }
        Method::GetRegistration => {
            let user_id = required_int(params, "userId")?;
            let info = server.get_registration(user_id)?;
            Ok(user_info_to_json(info))
        }
    }
}

fn handle_register_user(
    server: &mut dyn AdminServer,
    params: &Params,
) -> Result<Value, DispatchError> {
    let mut info = UserInfoMap::new();
    info.insert(UserInfoField::Name, required_string(params, "username")?);
    info.insert(UserInfoField::Password, required_string(params, "password")?);
    let user_id = server.register_user(&info)?;
    Ok(json!(user_id))
}

fn handle_update_registration(
    server: &mut dyn AdminServer,
    params: &Params,
) -> Result<Value, DispatchError> {
    let user_id = required_int(params, "userId")?;
    let empty = Map::new();
    let updates = match params.get("updates") {
        None | Some(Value::Null) => &empty,
        Some(value) => object("updates", value)?,
    };

    // only keys the caller sent are forwarded
    let mut info = UserInfoMap::new();
    if updates.contains_key("username") {
        info.insert(UserInfoField::Name, required_string(updates, "username")?);
    }
    if updates.contains_key("password") {
        info.insert(UserInfoField::Password, required_string(updates, "password")?);
    }
    server.update_registration(user_id, &info)?;
    Ok(Value::Null)
}

fn handle_set_acl(server: &mut dyn AdminServer, params: &Params) -> Result<Value, DispatchError> {
    let channel_id = required_int(params, "channelId")?;
    let entries = match params.get("acls") {
        None | Some(Value::Null) => &[][..],
        Some(value) => array("acls", value)?,
    };
    let acls = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| acl_from_json(index, entry))
        .collect::<Result<Vec<_>, _>>()?;
    let inherit = bool_or(params, "inherit", true);

    // group definitions are not editable through the bridge
    server.set_acl(channel_id, &acls, &[], inherit)?;
    Ok(Value::Null)
}

fn acl_from_json(index: usize, entry: &Value) -> Result<AclEntry, DispatchError> {
    let field = format!("acls[{index}]");
    let entry = object(&field, entry)?;
    let defaults = AclEntry::default();
    // `userid` is the wire name; `userId` is accepted as well
    let user_id = match entry.get("userid") {
        Some(_) => int_or(entry, "userid", defaults.user_id)?,
        None => int_or(entry, "userId", defaults.user_id)?,
    };
    Ok(AclEntry {
        apply_here: bool_or(entry, "applyHere", defaults.apply_here),
        apply_subs: bool_or(entry, "applySubs", defaults.apply_subs),
        inherited: bool_or(entry, "inherited", defaults.inherited),
        user_id,
        group: string_or(entry, "group", &defaults.group)?,
        allow: int_or(entry, "allow", defaults.allow)?,
        deny: int_or(entry, "deny", defaults.deny)?,
    })
}

// ============================================================================
// Result Shaping
// ============================================================================

/// JSON object keys must be strings, so integer user ids are stringified.
fn name_map_to_json(users: NameMap) -> Value {
    Value::Object(
        users
            .into_iter()
            .map(|(id, name)| (id.to_string(), Value::String(name)))
            .collect(),
    )
}

/// Group definitions are dropped from the response.
fn acl_snapshot_to_json(snapshot: AclSnapshot) -> Value {
    let acls: Vec<Value> = snapshot
        .acls
        .iter()
        .map(|acl| {
            json!({
                "applyHere": acl.apply_here,
                "applySubs": acl.apply_subs,
                "inherited": acl.inherited,
                "userid": acl.user_id,
                "group": acl.group,
                "allow": acl.allow,
                "deny": acl.deny,
            })
        })
        .collect();
    json!({
        "acls": acls,
        "inherit": snapshot.inherit,
    })
}

fn user_info_to_json(info: UserInfoMap) -> Value {
    Value::Object(
        info.into_iter()
            .map(|(field, value)| (field.label(), Value::String(value)))
            .collect(),
    )
}
