use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::field::{
    enforce_single_primary, insert_with_displacement, primary_entry, FieldEntry, FieldGroup,
};
use super::{Email, ImHandle, Name, Organization, Phone, PostalAddress};
use crate::normalize::{self, HomeDomains};

/// One contact. Repeated groups keep at most one primary entry and every
/// mutation stamps `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    id: String,
    title: String,
    name: Name,
    note: Option<String>,
    etag: Option<String>,
    organizations: Vec<Organization>,
    emails: Vec<Email>,
    phones: Vec<Phone>,
    im_handles: Vec<ImHandle>,
    addresses: Vec<PostalAddress>,
    groups: Vec<String>,
    extended_properties: BTreeMap<String, String>,
    updated_at: DateTime<Utc>,
}

impl ContactRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            name: Name::default(),
            note: None,
            etag: None,
            organizations: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
            im_handles: Vec::new(),
            addresses: Vec::new(),
            groups: Vec::new(),
            extended_properties: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last path segment of the id, as it appears in contact URLs.
    pub fn short_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn phones(&self) -> &[Phone] {
        &self.phones
    }

    pub fn im_handles(&self) -> &[ImHandle] {
        &self.im_handles
    }

    pub fn addresses(&self) -> &[PostalAddress] {
        &self.addresses
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn extended_properties(&self) -> &BTreeMap<String, String> {
        &self.extended_properties
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Value of `key` on the group's primary entry, else on its first entry,
    /// else `default`.
    pub fn get_primary<'a>(&'a self, group: FieldGroup, key: &str, default: &'a str) -> &'a str {
        let value = match group {
            FieldGroup::Email => primary_entry(&self.emails).map(|e| e.field(key)),
            FieldGroup::Phone => primary_entry(&self.phones).map(|e| e.field(key)),
            FieldGroup::Organization => {
                primary_entry(&self.organizations).map(|e| e.field(key))
            }
            FieldGroup::Address => primary_entry(&self.addresses).map(|e| e.field(key)),
            // IM handles carry no primary flag.
            FieldGroup::Im => self.im_handles.first().map(|e| e.field(key)),
        };

        value.flatten().unwrap_or(default)
    }

    /// Primary organization as `"<title> at <org>"`.
    pub fn organization(&self) -> String {
        super::organization::join_title(
            Some(self.get_primary(FieldGroup::Organization, "title", "")),
            Some(self.get_primary(FieldGroup::Organization, "name", "")),
        )
    }

    /// Display strings of every organization, in order.
    pub fn organization_names(&self) -> impl Iterator<Item = String> + '_ {
        self.organizations.iter().map(|o| o.display())
    }

    /// Primary email address, empty when there is none.
    pub fn email(&self) -> &str {
        self.get_primary(FieldGroup::Email, "address", "")
    }

    pub fn email_addresses(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(|e| e.address.as_str())
    }

    /// Primary phone number, empty when there is none.
    pub fn phone(&self) -> &str {
        self.get_primary(FieldGroup::Phone, "number", "")
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Set the timestamp directly; the only setter that does not stamp it.
    pub fn set_updated_at(&mut self, updated_at: DateTime<Utc>) {
        self.updated_at = updated_at;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = name;
        self.touch();
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
        self.touch();
    }

    pub fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
        self.touch();
    }

    /// Make `value` (`"<title> at <org>"`) the primary organization.
    pub fn set_organization(&mut self, value: &str) {
        self.insert_organization(value, true, None);
    }

    /// Insert an organization. An existing entry with the same display
    /// string is replaced by the new one but keeps its details.
    pub fn insert_organization(&mut self, value: &str, primary: bool, label: Option<&str>) {
        let parsed = Organization::parse(value);
        let display = parsed.display();
        let mut org = self
            .organizations
            .iter()
            .find(|o| o.display() == display)
            .cloned()
            .unwrap_or(parsed);
        if label.is_some() {
            org.label = label.map(String::from);
        }
        org.is_primary = primary;

        insert_with_displacement(&mut self.organizations, org, |o| o.display() == display);
        self.touch();
    }

    /// Make `address` the primary email, inferring its relation.
    pub fn set_email(&mut self, address: &str, home_domains: &HomeDomains) {
        self.insert_email(address, true, None, home_domains);
    }

    pub fn insert_email(
        &mut self,
        address: &str,
        primary: bool,
        label: Option<&str>,
        home_domains: &HomeDomains,
    ) {
        let same = |e: &Email| e.address.eq_ignore_ascii_case(address);

        let mut email = match self.emails.iter().find(|e| same(e)) {
            Some(existing) => {
                let mut email = existing.clone();
                email.address = address.to_string();
                if label.is_some() {
                    email.label = label.map(String::from);
                }
                email
            }
            None => {
                let (relation, inferred_label) =
                    normalize::infer_email_relation(address, &self.organization(), home_domains);
                let mut email = Email::new(address.to_string());
                email.relation = Some(relation);
                email.label = label.or(inferred_label).map(String::from);
                email
            }
        };
        email.is_primary = primary;

        insert_with_displacement(&mut self.emails, email, same);
        self.touch();
    }

    pub fn insert_phone(&mut self, phone: Phone) {
        let number = phone.number.clone();
        insert_with_displacement(&mut self.phones, phone, |p| p.number == number);
        self.touch();
    }

    pub fn insert_address(&mut self, address: PostalAddress) {
        let same = address.clone();
        insert_with_displacement(&mut self.addresses, address, |a| a.same_place(&same));
        self.touch();
    }

    /// Add an IM handle; a no-op when the normalized (protocol, address)
    /// pair is already present.
    pub fn add_im(&mut self, handle: ImHandle) {
        let protocol = normalize::normalize_protocol(&handle.protocol);
        let exists = self.im_handles.iter().any(|im| {
            im.address == handle.address && normalize::normalize_protocol(&im.protocol) == protocol
        });

        if !exists {
            self.im_handles.push(ImHandle { protocol, ..handle });
            self.touch();
        }
    }

    pub fn add_group(&mut self, href: impl Into<String>) {
        let href = href.into();
        if !self.groups.contains(&href) {
            self.groups.push(href);
            self.touch();
        }
    }

    pub fn remove_group(&mut self, href: &str) {
        let before = self.groups.len();
        self.groups.retain(|g| g != href);
        if self.groups.len() != before {
            self.touch();
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extended_properties.insert(key.into(), value.into());
        self.touch();
    }

    pub fn clear_organizations(&mut self) {
        self.organizations.clear();
        self.touch();
    }

    pub fn clear_emails(&mut self) {
        self.emails.clear();
        self.touch();
    }

    pub fn clear_phones(&mut self) {
        self.phones.clear();
        self.touch();
    }

    pub fn clear_ims(&mut self) {
        self.im_handles.clear();
        self.touch();
    }

    pub fn clear_addresses(&mut self) {
        self.addresses.clear();
        self.touch();
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
        self.touch();
    }

    /// Normalize IM protocols, label Outlook "Internet Email" entries and
    /// drop repeated emails and IM handles.
    pub fn clean(&mut self) {
        normalize::label_internet_emails(&mut self.emails);
        self.emails = normalize::dedupe_emails(&self.emails);
        self.im_handles = normalize::clean_ims(&self.im_handles);
        self.touch();
    }

    /// Bulk replacement used at the ingestion boundary. Primary flags are
    /// reduced to one per group; the timestamp is left alone.
    pub(crate) fn load_groups(&mut self, groups: LoadedGroups) {
        self.name = groups.name;
        self.note = groups.note;
        self.etag = groups.etag;
        self.organizations = groups.organizations;
        self.emails = groups.emails;
        self.phones = groups.phones;
        self.im_handles = groups.im_handles;
        self.addresses = groups.addresses;
        self.groups = groups.groups;
        self.extended_properties = groups.extended_properties;

        enforce_single_primary(&mut self.organizations);
        enforce_single_primary(&mut self.emails);
        enforce_single_primary(&mut self.phones);
        enforce_single_primary(&mut self.addresses);
    }
}

/// Field groups parsed from a feed entry, handed to the record in one go.
#[derive(Debug, Default)]
pub(crate) struct LoadedGroups {
    pub name: Name,
    pub note: Option<String>,
    pub etag: Option<String>,
    pub organizations: Vec<Organization>,
    pub emails: Vec<Email>,
    pub phones: Vec<Phone>,
    pub im_handles: Vec<ImHandle>,
    pub addresses: Vec<PostalAddress>,
    pub groups: Vec<String>,
    pub extended_properties: BTreeMap<String, String>,
}
