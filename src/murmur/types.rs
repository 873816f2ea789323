//! Murmur Slice types used by the admin operations, with their encoding.

use crate::ice::{DecodeError, InputStream, OutputStream};
use std::collections::BTreeMap;

/// Keys of a registration record (`Murmur::UserInfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserInfoField {
    Name,
    Email,
    Comment,
    Hash,
    Password,
    LastActive,
    KdfIterations,
    /// Index outside the known enumeration, kept as sent.
    Other(u8),
}

impl UserInfoField {
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Name,
            1 => Self::Email,
            2 => Self::Comment,
            3 => Self::Hash,
            4 => Self::Password,
            5 => Self::LastActive,
            6 => Self::KdfIterations,
            other => Self::Other(other),
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Name => 0,
            Self::Email => 1,
            Self::Comment => 2,
            Self::Hash => 3,
            Self::Password => 4,
            Self::LastActive => 5,
            Self::KdfIterations => 6,
            Self::Other(index) => index,
        }
    }

    /// Readable key used in JSON responses; unknown indices fall back to the
    /// raw number.
    pub fn label(self) -> String {
        match self {
            Self::Name => "UserName".to_string(),
            Self::Email => "UserEmail".to_string(),
            Self::Comment => "UserComment".to_string(),
            Self::Hash => "UserHash".to_string(),
            Self::Password => "UserPassword".to_string(),
            Self::LastActive => "UserLastActive".to_string(),
            Self::KdfIterations => "UserKDFIterations".to_string(),
            Self::Other(index) => index.to_string(),
        }
    }
}

pub type UserInfoMap = BTreeMap<UserInfoField, String>;

/// Registered user ids mapped to display names (`Murmur::NameMap`).
pub type NameMap = BTreeMap<i32, String>;

/// One access-control rule (`Murmur::ACL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub apply_here: bool,
    pub apply_subs: bool,
    pub inherited: bool,
    /// `-1` when the rule targets a group.
    pub user_id: i32,
    pub group: String,
    pub allow: i32,
    pub deny: i32,
}

impl Default for AclEntry {
    fn default() -> Self {
        Self {
            apply_here: true,
            apply_subs: true,
            inherited: false,
            user_id: -1,
            group: String::new(),
            allow: 0,
            deny: 0,
        }
    }
}

/// Channel group definition (`Murmur::Group`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub inherited: bool,
    pub inherit: bool,
    pub inheritable: bool,
    pub add: Vec<i32>,
    pub remove: Vec<i32>,
    pub members: Vec<i32>,
}

/// Result of `getACL`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclSnapshot {
    pub acls: Vec<AclEntry>,
    pub groups: Vec<Group>,
    pub inherit: bool,
}

pub(crate) fn write_user_info_map(out: &mut OutputStream, info: &UserInfoMap) {
    out.write_size(info.len());
    for (field, value) in info {
        out.write_byte(field.index());
        out.write_string(value);
    }
}

pub(crate) fn read_user_info_map(input: &mut InputStream<'_>) -> Result<UserInfoMap, DecodeError> {
    let count = input.read_size()?;
    let mut info = UserInfoMap::new();
    for _ in 0..count {
        let field = UserInfoField::from_index(input.read_byte()?);
        let value = input.read_string()?;
        info.insert(field, value);
    }
    Ok(info)
}

pub(crate) fn read_name_map(input: &mut InputStream<'_>) -> Result<NameMap, DecodeError> {
    let count = input.read_size()?;
    let mut names = NameMap::new();
    for _ in 0..count {
        let id = input.read_int()?;
        let name = input.read_string()?;
        names.insert(id, name);
    }
    Ok(names)
}

impl AclEntry {
    pub(crate) fn write(&self, out: &mut OutputStream) {
        out.write_bool(self.apply_here);
        out.write_bool(self.apply_subs);
        out.write_bool(self.inherited);
        out.write_int(self.user_id);
        out.write_string(&self.group);
        out.write_int(self.allow);
        out.write_int(self.deny);
    }

    pub(crate) fn read(input: &mut InputStream<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            apply_here: input.read_bool()?,
            apply_subs: input.read_bool()?,
            inherited: input.read_bool()?,
            user_id: input.read_int()?,
            group: input.read_string()?,
            allow: input.read_int()?,
            deny: input.read_int()?,
        })
    }
}

impl Group {
    pub(crate) fn write(&self, out: &mut OutputStream) {
        out.write_string(&self.name);
        out.write_bool(self.inherited);
        out.write_bool(self.inherit);
        out.write_bool(self.inheritable);
        out.write_int_seq(&self.add);
        out.write_int_seq(&self.remove);
        out.write_int_seq(&self.members);
    }

    pub(crate) fn read(input: &mut InputStream<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: input.read_string()?,
            inherited: input.read_bool()?,
            inherit: input.read_bool()?,
            inheritable: input.read_bool()?,
            add: input.read_int_seq()?,
            remove: input.read_int_seq()?,
            members: input.read_int_seq()?,
        })
    }
}

pub(crate) fn write_acl_list(out: &mut OutputStream, acls: &[AclEntry]) {
    out.write_size(acls.len());
    for acl in acls {
        acl.write(out);
    }
}

pub(crate) fn write_group_list(out: &mut OutputStream, groups: &[Group]) {
    out.write_size(groups.len());
    for group in groups {
        group.write(out);
    }
}

pub(crate) fn read_acl_snapshot(input: &mut InputStream<'_>) -> Result<AclSnapshot, DecodeError> {
    let acl_count = input.read_size()?;
    let mut acls = Vec::with_capacity(acl_count.min(input.remaining()));
    for _ in 0..acl_count {
        acls.push(AclEntry::read(input)?);
    }
    let group_count = input.read_size()?;
    let mut groups = Vec::with_capacity(group_count.min(input.remaining()));
    for _ in 0..group_count {
        groups.push(Group::read(input)?);
    }
    let inherit = input.read_bool()?;
    Ok(AclSnapshot {
        acls,
        groups,
        inherit,
    })
}
