//! Client events pushed by the message, wallet and exchange services.
//!
//! On the wire an event is a type tag plus a JSON string whose shape
//! depends on the tag. Each service's events decode into one enum with a
//! variant per tag, so an unknown tag or a mismatched payload is an error
//! at the boundary instead of a surprise later.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tollgate_lib::{ClientId, Environment, ProtocolError, Result};

use crate::admission::require_in_range;

/// Event payloads of one service.
pub trait ClientEvent: Sized {
    /// Name used in error reports for unknown tags.
    const TAG_NAME: &'static str;

    fn tag(&self) -> u8;

    /// Decode the payload of event type `tag`.
    fn decode(tag: u8, args: &str) -> Result<Self>;

    fn encode_args(&self) -> Result<String>;
}

#[derive(Serialize, Deserialize)]
struct IdPair {
    #[serde(rename = "Item1")]
    first: ClientId,
    #[serde(rename = "Item2")]
    second: ClientId,
}

#[derive(Serialize, Deserialize)]
struct StampedPair {
    #[serde(rename = "Item1")]
    peer: ClientId,
    #[serde(rename = "Item2")]
    id: ClientId,
    #[serde(rename = "Item3")]
    time: DateTime<Utc>,
}

fn parse<T: DeserializeOwned>(args: &str) -> Result<T> {
    serde_json::from_str(args).map_err(|e| ProtocolError::malformed("event_args", e.to_string()))
}

fn render<T: Serialize>(args: &T) -> Result<String> {
    Ok(serde_json::to_string(args)?)
}

/// Events without a payload carry a bare integer.
fn parse_marker(args: &str) -> Result<()> {
    parse::<i64>(args).map(|_| ())
}

const MARKER: &str = "0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageEvent {
    NewSentMessage {
        to: ClientId,
        message_id: ClientId,
        sent_time: DateTime<Utc>,
    },
    NewReceivedMessage {
        from: ClientId,
        message_id: ClientId,
        sent_time: DateTime<Utc>,
    },
}

impl ClientEvent for MessageEvent {
    const TAG_NAME: &'static str = "message_event_type";

    fn tag(&self) -> u8 {
        match self {
            Self::NewSentMessage { .. } => 0,
            Self::NewReceivedMessage { .. } => 1,
        }
    }

    fn decode(tag: u8, args: &str) -> Result<Self> {
        match tag {
            0 => {
                let p: StampedPair = parse(args)?;
                Ok(Self::NewSentMessage {
                    to: p.peer,
                    message_id: p.id,
                    sent_time: p.time,
                })
            }
            1 => {
                let p: StampedPair = parse(args)?;
                Ok(Self::NewReceivedMessage {
                    from: p.peer,
                    message_id: p.id,
                    sent_time: p.time,
                })
            }
            other => Err(ProtocolError::unsupported(Self::TAG_NAME, other)),
        }
    }

    fn encode_args(&self) -> Result<String> {
        let (peer, id, time) = match *self {
            Self::NewSentMessage {
                to,
                message_id,
                sent_time,
            } => (to, message_id, sent_time),
            Self::NewReceivedMessage {
                from,
                message_id,
                sent_time,
            } => (from, message_id, sent_time),
        };
        render(&StampedPair { peer, id, time })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    NewSentTransfer {
        to: ClientId,
        transfer_id: ClientId,
        sent_time: DateTime<Utc>,
    },
    NewReceivedTransfer {
        from: ClientId,
        transfer_id: ClientId,
        sent_time: DateTime<Utc>,
    },
}

impl ClientEvent for WalletEvent {
    const TAG_NAME: &'static str = "wallet_event_type";

    fn tag(&self) -> u8 {
        match self {
            Self::NewSentTransfer { .. } => 0,
            Self::NewReceivedTransfer { .. } => 1,
        }
    }

    fn decode(tag: u8, args: &str) -> Result<Self> {
        match tag {
            0 => {
                let p: StampedPair = parse(args)?;
                Ok(Self::NewSentTransfer {
                    to: p.peer,
                    transfer_id: p.id,
                    sent_time: p.time,
                })
            }
            1 => {
                let p: StampedPair = parse(args)?;
                Ok(Self::NewReceivedTransfer {
                    from: p.peer,
                    transfer_id: p.id,
                    sent_time: p.time,
                })
            }
            other => Err(ProtocolError::unsupported(Self::TAG_NAME, other)),
        }
    }

    fn encode_args(&self) -> Result<String> {
        let (peer, id, time) = match *self {
            Self::NewSentTransfer {
                to,
                transfer_id,
                sent_time,
            } => (to, transfer_id, sent_time),
            Self::NewReceivedTransfer {
                from,
                transfer_id,
                sent_time,
            } => (from, transfer_id, sent_time),
        };
        render(&StampedPair { peer, id, time })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeEvent {
    SecurityListChanged,
    CurrencyListChanged,
    AccountNewTransfer { account: ClientId },
    AccountLockedFundsAdded { account: ClientId, locked_funds: ClientId },
    AccountLockedFundsModified { account: ClientId, locked_funds: ClientId },
    AccountLockedFundsReleased { account: ClientId, locked_funds: ClientId },
    AccountListChanged,
    NewTrade,
    NewOrder,
    OrderChanged { order: ClientId },
    SecurityCurrencyPairListChanged,
    NewDeposit,
    DepositChanged { account: ClientId, deposit: ClientId },
    NewWithdraw,
    WithdrawChanged { account: ClientId, withdraw: ClientId },
}

impl ClientEvent for ExchangeEvent {
    const TAG_NAME: &'static str = "exchange_event_type";

    fn tag(&self) -> u8 {
        match self {
            Self::SecurityListChanged => 0,
            Self::CurrencyListChanged => 1,
            Self::AccountNewTransfer { .. } => 2,
            Self::AccountLockedFundsAdded { .. } => 3,
            Self::AccountLockedFundsModified { .. } => 4,
            Self::AccountLockedFundsReleased { .. } => 5,
            Self::AccountListChanged => 6,
            Self::NewTrade => 7,
            Self::NewOrder => 8,
            Self::OrderChanged { .. } => 9,
            Self::SecurityCurrencyPairListChanged => 10,
            Self::NewDeposit => 11,
            Self::DepositChanged { .. } => 12,
            Self::NewWithdraw => 13,
            Self::WithdrawChanged { .. } => 14,
        }
    }

    fn decode(tag: u8, args: &str) -> Result<Self> {
        let event = match tag {
            0 => parse_marker(args).map(|_| Self::SecurityListChanged)?,
            1 => parse_marker(args).map(|_| Self::CurrencyListChanged)?,
            2 => Self::AccountNewTransfer {
                account: parse(args)?,
            },
            3..=5 => {
                let p: IdPair = parse(args)?;
                let (account, locked_funds) = (p.first, p.second);
                match tag {
                    3 => Self::AccountLockedFundsAdded {
                        account,
                        locked_funds,
                    },
                    4 => Self::AccountLockedFundsModified {
                        account,
                        locked_funds,
                    },
                    _ => Self::AccountLockedFundsReleased {
                        account,
                        locked_funds,
                    },
                }
            }
            6 => parse_marker(args).map(|_| Self::AccountListChanged)?,
            7 => parse_marker(args).map(|_| Self::NewTrade)?,
            8 => parse_marker(args).map(|_| Self::NewOrder)?,
            9 => Self::OrderChanged {
                order: parse(args)?,
            },
            10 => parse_marker(args).map(|_| Self::SecurityCurrencyPairListChanged)?,
            11 => parse_marker(args).map(|_| Self::NewDeposit)?,
            12 => {
                let p: IdPair = parse(args)?;
                Self::DepositChanged {
                    account: p.first,
                    deposit: p.second,
                }
            }
            13 => parse_marker(args).map(|_| Self::NewWithdraw)?,
            14 => {
                let p: IdPair = parse(args)?;
                Self::WithdrawChanged {
                    account: p.first,
                    withdraw: p.second,
                }
            }
            other => return Err(ProtocolError::unsupported(Self::TAG_NAME, other)),
        };
        Ok(event)
    }

    fn encode_args(&self) -> Result<String> {
        match *self {
            Self::SecurityListChanged
            | Self::CurrencyListChanged
            | Self::AccountListChanged
            | Self::NewTrade
            | Self::NewOrder
            | Self::SecurityCurrencyPairListChanged
            | Self::NewDeposit
            | Self::NewWithdraw => Ok(MARKER.to_string()),
            Self::AccountNewTransfer { account } => render(&account),
            Self::OrderChanged { order } => render(&order),
            Self::AccountLockedFundsAdded {
                account,
                locked_funds,
            }
            | Self::AccountLockedFundsModified {
                account,
                locked_funds,
            }
            | Self::AccountLockedFundsReleased {
                account,
                locked_funds,
            } => render(&IdPair {
                first: account,
                second: locked_funds,
            }),
            Self::DepositChanged { account, deposit } => render(&IdPair {
                first: account,
                second: deposit,
            }),
            Self::WithdrawChanged { account, withdraw } => render(&IdPair {
                first: account,
                second: withdraw,
            }),
        }
    }
}

/// Wire envelope of one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedClientEvent {
    pub event_id: ClientId,
    pub event_type: u8,
    pub args: String,
    pub raised_at: DateTime<Utc>,
}

impl SerializedClientEvent {
    pub fn encode<E: ClientEvent>(
        event_id: ClientId,
        event: &E,
        raised_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            event_id,
            event_type: event.tag(),
            args: event.encode_args()?,
            raised_at,
        })
    }

    pub fn decode<E: ClientEvent>(&self) -> Result<E> {
        E::decode(self.event_type, &self.args).inspect_err(|err| {
            tracing::debug!(event_id = %self.event_id, event_type = self.event_type, %err, "undecodable event");
        })
    }
}

fn default_max_buffer_count() -> usize {
    100
}

fn default_max_buffer_secs() -> u32 {
    3
}

fn earliest_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn latest_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Long-poll subscription to a service's event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeEventsRequest {
    pub start_time: DateTime<Utc>,
    /// Resume after this event; nil to start at `start_time`.
    #[serde(default)]
    pub last_known_event: ClientId,
    #[serde(default = "default_max_buffer_count")]
    pub max_buffer_count: usize,
    /// How long the service may hold events back to batch them.
    #[serde(default = "default_max_buffer_secs")]
    pub max_buffer_secs: u32,
    pub timeout_secs: u32,
}

impl SubscribeEventsRequest {
    /// Subscription with the environment's default timeout.
    pub fn new(environment: Environment, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            last_known_event: ClientId::NIL,
            max_buffer_count: default_max_buffer_count(),
            max_buffer_secs: default_max_buffer_secs(),
            timeout_secs: environment.event_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_in_range("start_time", &self.start_time, earliest_start()..=latest_start())?;
        require_in_range("max_buffer_count", &self.max_buffer_count, 1..=100)?;
        require_in_range("max_buffer_secs", &self.max_buffer_secs, 0..=30)?;
        require_in_range("timeout_secs", &self.timeout_secs, 0..=300)
    }
}

/// Page of exchange items created since `start_time`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesSinceRequest {
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_max_buffer_count")]
    pub max_buffer_count: usize,
}

impl ChangesSinceRequest {
    pub fn validate(&self) -> Result<()> {
        require_in_range("start_time", &self.start_time, earliest_start()..=latest_start())?;
        require_in_range("max_buffer_count", &self.max_buffer_count, 1..=100)
    }
}
