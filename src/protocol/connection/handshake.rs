use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::constant::{
    CAPABILITIES_ALWAYS_ENABLED, CAPABILITIES_REQUIRED, CapabilityFlags, UTF8MB4_GENERAL_CI,
};
use crate::error::{Error, Result, eyre};
use crate::protocol::primitive::*;
use crate::protocol::response::ErrPayloadBytes;

const MAX_PACKET_SIZE: u32 = 16_777_216;

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct HandshakeFixedFields {
    connection_id: U32LE,
    auth_data_part1: [u8; 8],
    filler: u8,
    capability_flags_lower: U16LE,
    charset: u8,
    status_flags: U16LE,
    capability_flags_upper: U16LE,
    auth_data_len: u8,
}

/// Initial Handshake Packet (protocol version 10)
#[derive(Debug, Clone)]
pub struct InitialHandshake<'a> {
    pub server_version: &'a [u8],
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub auth_plugin_name: &'a [u8],
}

/// Read initial handshake packet from server
pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake<'_>> {
    let (protocol_version, data) = read_int_1(payload)?;
    if protocol_version == 0xFF {
        return Err(ErrPayloadBytes(payload).into());
    }
    if protocol_version != 10 {
        return Err(Error::BadConfigError(format!(
            "unsupported protocol version {protocol_version}"
        )));
    }

    let (server_version, data) = read_string_null(data)?;
    let (fixed, rest) =
        HandshakeFixedFields::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;

    let cap_bits = ((fixed.capability_flags_upper.get() as u32) << 16)
        | (fixed.capability_flags_lower.get() as u32);
    let capability_flags = CapabilityFlags::from_bits_truncate(cap_bits);

    let (_reserved, rest) = read_string_fix(rest, 10)?;

    // part 2 is at least 12 bytes and NUL terminated
    let auth_data_2_len = (fixed.auth_data_len as usize).saturating_sub(9).max(12);
    let (auth_data_2, rest) = read_string_fix(rest, auth_data_2_len)?;
    let (_nul, rest) = read_int_1(rest)?;

    let mut auth_plugin_data = Vec::with_capacity(8 + auth_data_2.len());
    auth_plugin_data.extend_from_slice(&fixed.auth_data_part1);
    auth_plugin_data.extend_from_slice(auth_data_2);

    // some servers omit the trailing NUL of the plugin name
    let auth_plugin_name = match read_string_null(rest) {
        Ok((name, _)) => name,
        Err(_) => rest,
    };

    Ok(InitialHandshake {
        server_version,
        connection_id: fixed.connection_id.get(),
        auth_plugin_data,
        capability_flags,
        charset: fixed.charset,
        auth_plugin_name,
    })
}

/// Handshake response packet sent by client (HandshakeResponse41)
#[derive(Debug, Clone)]
pub struct HandshakeResponse41<'a> {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: &'a str,
}

/// Write handshake response packet (HandshakeResponse41)
pub fn write_handshake_response(out: &mut Vec<u8>, response: &HandshakeResponse41<'_>) {
    write_int_4(out, response.capability_flags.bits());
    write_int_4(out, response.max_packet_size);
    write_int_1(out, response.charset);
    out.extend_from_slice(&[0u8; 23]);
    write_string_null(out, response.username);

    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
    {
        write_bytes_lenenc(out, response.auth_response);
    } else {
        write_int_1(out, response.auth_response.len() as u8);
        out.extend_from_slice(response.auth_response);
    }

    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB)
        && let Some(db) = response.database
    {
        write_string_null(out, db);
    }

    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH)
    {
        write_string_null(out, response.auth_plugin_name);
    }
}

/// Auth switch request from server
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest<'a> {
    pub plugin_name: &'a [u8],
    pub plugin_data: &'a [u8],
}

/// Read auth switch request (0xFE followed by plugin name and data)
pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest<'_>> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    let (plugin_name, data) = read_string_null(data)?;
    let plugin_data = match data.split_last() {
        Some((0, head)) => head,
        _ => data,
    };
    Ok(AuthSwitchRequest {
        plugin_name,
        plugin_data,
    })
}

/// mysql_native_password authentication
///
/// SHA1(password) XOR SHA1(challenge + SHA1(SHA1(password)))
pub fn auth_mysql_native_password(password: &str, challenge: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};

    if password.is_empty() {
        return [0u8; 20];
    }

    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(challenge);
    hasher.update(stage2);
    let token = hasher.finalize();

    let mut result = [0u8; 20];
    for (out, (a, b)) in result.iter_mut().zip(stage1.iter().zip(token.iter())) {
        *out = a ^ b;
    }
    result
}

/// caching_sha2_password authentication - scramble sent with the handshake response
///
/// XOR(SHA256(password), SHA256(SHA256(SHA256(password)), challenge))
pub fn auth_caching_sha2_password(password: &str, challenge: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    if password.is_empty() {
        return [0u8; 32];
    }

    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(challenge);
    let scramble = hasher.finalize();

    let mut result = [0u8; 32];
    for (out, (a, b)) in result.iter_mut().zip(stage1.iter().zip(scramble.iter())) {
        *out = a ^ b;
    }
    result
}

fn auth_response(plugin: &[u8], password: &str, challenge: &[u8]) -> Result<Vec<u8>> {
    match plugin {
        b"mysql_native_password" => Ok(auth_mysql_native_password(password, challenge).to_vec()),
        b"caching_sha2_password" => Ok(auth_caching_sha2_password(password, challenge).to_vec()),
        plugin => Err(Error::UnsupportedAuthPlugin(
            String::from_utf8_lossy(plugin).into_owned(),
        )),
    }
}

/// Credentials and target schema of a handshake
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

/// Result of driving the handshake state machine
#[derive(Debug)]
pub enum HandshakeResult {
    /// Write this payload to the server, then read the next packet
    Write(Vec<u8>),
    /// Nothing to write; read the next packet
    Read,
    /// Handshake complete, connection established
    Connected {
        capability_flags: CapabilityFlags,
        connection_id: u32,
        server_version: String,
    },
}

#[derive(Debug)]
pub struct Negotiated {
    capability_flags: CapabilityFlags,
    connection_id: u32,
    server_version: String,
}

/// State machine for the MySQL handshake
///
/// Pure parsing and packet generation, no I/O.
#[derive(Debug)]
pub enum Handshake {
    /// Waiting for initial handshake from server
    Start { config: HandshakeConfig },
    /// Sent a handshake or auth switch response, waiting for the auth result
    WaitingAuthResult {
        password: String,
        plugin: Vec<u8>,
        negotiated: Negotiated,
    },
    /// Connected (terminal state)
    Connected,
}

impl Handshake {
    pub fn new(config: HandshakeConfig) -> Self {
        Self::Start { config }
    }

    /// Drive the state machine with the next payload read from the server
    pub fn drive(&mut self, payload: &[u8]) -> Result<HandshakeResult> {
        match std::mem::replace(self, Self::Connected) {
            Self::Start { config } => {
                let handshake = read_initial_handshake(payload)?;
                let server_caps = handshake.capability_flags;

                if !server_caps.contains(CAPABILITIES_REQUIRED) {
                    return Err(Error::BadConfigError(format!(
                        "server lacks required capabilities {:?}",
                        CAPABILITIES_REQUIRED.difference(server_caps)
                    )));
                }

                let mut client_caps = CAPABILITIES_ALWAYS_ENABLED;
                if config.database.is_some() {
                    client_caps |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
                }
                let capability_flags = client_caps & server_caps;

                let plugin = handshake.auth_plugin_name;
                let auth = auth_response(plugin, &config.password, &handshake.auth_plugin_data)?;
                let plugin_name = std::str::from_utf8(plugin).map_err(|_| Error::InvalidPacket)?;

                let mut out = Vec::new();
                write_handshake_response(
                    &mut out,
                    &HandshakeResponse41 {
                        capability_flags,
                        max_packet_size: MAX_PACKET_SIZE,
                        charset: UTF8MB4_GENERAL_CI,
                        username: &config.username,
                        auth_response: &auth,
                        database: config.database.as_deref(),
                        auth_plugin_name: plugin_name,
                    },
                );

                *self = Self::WaitingAuthResult {
                    password: config.password,
                    plugin: plugin.to_vec(),
                    negotiated: Negotiated {
                        capability_flags,
                        connection_id: handshake.connection_id,
                        server_version: String::from_utf8_lossy(handshake.server_version)
                            .into_owned(),
                    },
                };
                Ok(HandshakeResult::Write(out))
            }

            Self::WaitingAuthResult {
                password,
                plugin,
                negotiated,
            } => match payload.first() {
                Some(0x00) => Ok(HandshakeResult::Connected {
                    capability_flags: negotiated.capability_flags,
                    connection_id: negotiated.connection_id,
                    server_version: negotiated.server_version,
                }),
                Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
                Some(0xFE) => {
                    let switch = read_auth_switch_request(payload)?;
                    let auth = auth_response(switch.plugin_name, &password, switch.plugin_data)?;
                    *self = Self::WaitingAuthResult {
                        password,
                        plugin: switch.plugin_name.to_vec(),
                        negotiated,
                    };
                    Ok(HandshakeResult::Write(auth))
                }
                // AuthMoreData: caching_sha2_password fast auth result
                Some(0x01) if plugin == b"caching_sha2_password" => match payload.get(1) {
                    Some(0x03) => {
                        *self = Self::WaitingAuthResult {
                            password,
                            plugin,
                            negotiated,
                        };
                        Ok(HandshakeResult::Read)
                    }
                    Some(0x04) => Err(Error::UnsupportedAuthPlugin(
                        "caching_sha2_password full authentication requires TLS or RSA"
                            .to_string(),
                    )),
                    _ => Err(Error::InvalidPacket),
                },
                _ => Err(Error::InvalidPacket),
            },

            Self::Connected => Err(Error::LibraryBug(eyre!(
                "handshake driven after the connection was established"
            ))),
        }
    }
}
