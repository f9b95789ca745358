use mongodb::IndexModel;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An entity of the catalog and the collection it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub name: &'static str,
    pub collection: &'static str,
}

const fn entity(name: &'static str, collection: &'static str) -> Entity {
    Entity { name, collection }
}

pub const ENTITIES: &[Entity] = &[
    entity("Bucket", "buckets"),
    entity("BucketEntry", "bucketentries"),
    entity("Contact", "contacts"),
    entity("Credit", "credits"),
    entity("Debit", "debits"),
    entity("ExchangeReport", "exchangereports"),
    entity("Frame", "frames"),
    entity("FullAudit", "fullaudits"),
    entity("Marketing", "marketings"),
    entity("Mirror", "mirrors"),
    entity("PaymentProcessor", "paymentprocessors"),
    entity("Partner", "partners"),
    entity("Pointer", "pointers"),
    entity("PublicKey", "publickeys"),
    entity("Referral", "referrals"),
    entity("Shard", "shards"),
    entity("StorageEvent", "storageevents"),
    entity("Token", "tokens"),
    entity("User", "users"),
    entity("UserNonce", "usernonces"),
];

/// A typed document stored in one catalog collection.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
    const COLLECTION: &'static str;

    fn indexes() -> Vec<IndexModel> {
        Vec::new()
    }
}

/// A contact that can mirror a shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mirror {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "shardHash")]
    pub shard_hash: String,
    /// Node id of the contact.
    pub contact: String,
    pub contract: Document,
    #[serde(rename = "isEstablished", default)]
    pub is_established: bool,
}

impl Mirror {
    pub fn new(shard_hash: String, contact: String, contract: Document) -> Self {
        Self {
            id: None,
            shard_hash,
            contact,
            contract,
            is_established: false,
        }
    }
}

impl Model for Mirror {
    const NAME: &'static str = "Mirror";
    const COLLECTION: &'static str = "mirrors";

    fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::builder()
                .keys(doc! { "shardHash": 1, "isEstablished": -1 })
                .build(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralType {
    Link,
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralSender {
    /// Marketing document of the sender.
    pub id: ObjectId,
    pub amount_to_credit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<ObjectId>,
    #[serde(rename = "referralLink")]
    pub referral_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecipient {
    pub email: String,
    pub amount_to_credit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<ObjectId>,
    pub min_billed_requirement: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralConversion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_signup: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_billed: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sender: ReferralSender,
    pub recipient: ReferralRecipient,
    pub created: DateTime,
    #[serde(default)]
    pub converted: ReferralConversion,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReferralType>,
}

impl Model for Referral {
    const NAME: &'static str = "Referral";
    const COLLECTION: &'static str = "referrals";

    fn indexes() -> Vec<IndexModel> {
        ["sender.id", "sender.referralLink", "recipient.email"]
            .into_iter()
            .map(|field| IndexModel::builder().keys(doc! { field: 1 }).build())
            .collect()
    }
}

/// Storage and bandwidth usage recorded for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub bucket: ObjectId,
    pub bucket_entry: ObjectId,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub download_bandwidth: i64,
    pub storage: i64,
    #[serde(default)]
    pub processed: bool,
    pub timestamp: DateTime,
}

impl StorageEvent {
    pub fn new(bucket: ObjectId, bucket_entry: ObjectId, user: String) -> Self {
        Self {
            id: None,
            bucket,
            bucket_entry,
            user,
            token: None,
            farmer: None,
            client: None,
            download_bandwidth: 0,
            storage: 0,
            processed: false,
            timestamp: DateTime::now(),
        }
    }
}

impl Model for StorageEvent {
    const NAME: &'static str = "StorageEvent";
    const COLLECTION: &'static str = "storageevents";
}
