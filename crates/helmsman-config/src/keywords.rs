//! Keyword allow-lists derived from section bitmasks.
//!
//! Every configuration keyword carries a bit value that is the OR of the
//! bits of every section it is valid in. A section's allowed-keyword set is
//! computed once, on first use, by intersecting each keyword's bits with
//! the section's bit.

use std::sync::OnceLock;

use crate::section::Section;

const G: u32 = Section::Global.bit();
const D: u32 = Section::Defaults.bit();
const F: u32 = Section::Frontend.bit();
const L: u32 = Section::Listen.bit();
const B: u32 = Section::Backend.bit();

/// Every known configuration keyword and the sections it may appear in.
///
/// Multi-word keywords (`capture cookie`, `timeout client`, …) are matched
/// against config lines by string prefix, so they are listed in full.
pub static KEYWORDS: &[(&str, u32)] = &[
    // Process-wide settings.
    ("ca-base", G),
    ("chroot", G),
    ("crt-base", G),
    ("daemon", G),
    ("debug", G),
    ("gid", G),
    ("group", G),
    ("log-send-hostname", G),
    ("maxcompcpuusage", G),
    ("maxcomprate", G),
    ("maxconnrate", G),
    ("maxpipes", G),
    ("maxsslconn", G),
    ("nbproc", G),
    ("node", G),
    ("noepoll", G),
    ("nokqueue", G),
    ("nopoll", G),
    ("nosplice", G),
    ("pidfile", G),
    ("quiet", G),
    ("spread-checks", G),
    ("stats", G),
    ("tune.bufsize", G),
    ("tune.chksize", G),
    ("tune.comp.maxlevel", G),
    ("tune.http.cookielen", G),
    ("tune.http.maxhdr", G),
    ("tune.maxaccept", G),
    ("tune.maxpollevents", G),
    ("tune.maxrewrite", G),
    ("tune.pipesize", G),
    ("tune.rcvbuf.client", G),
    ("tune.rcvbuf.server", G),
    ("tune.sndbuf.client", G),
    ("tune.sndbuf.server", G),
    ("tune.ssl.cachesize", G),
    ("tune.ssl.lifetime", G),
    ("tune.ssl.maxrecord", G),
    ("tune.zlib.memlevel", G),
    ("tune.zlib.windowsize", G),
    ("uid", G),
    ("ulimit-n", G),
    ("unix-bind", G),
    ("user", G),
    // Listening side.
    ("bind", F | L),
    ("capture cookie", F | L),
    ("capture request header", F | L),
    ("capture response header", F | L),
    ("monitor fail", F | L),
    ("tcp-request connection", F | L),
    ("use_backend", F | L),
    ("backlog", D | F | L),
    ("default_backend", D | F | L),
    ("monitor-net", D | F | L),
    ("monitor-uri", D | F | L),
    ("option accept-invalid-http-request", D | F | L),
    ("option clitcpka", D | F | L),
    ("option contstats", D | F | L),
    ("option dontlog-normal", D | F | L),
    ("option dontlognull", D | F | L),
    ("option http-use-proxy-header", D | F | L),
    ("option log-separate-errors", D | F | L),
    ("option logasap", D | F | L),
    ("option socket-stats", D | F | L),
    ("option tcp-smart-accept", D | F | L),
    ("rate-limit sessions", D | F | L),
    ("timeout client", D | F | L),
    ("unique-id-format", D | F | L),
    ("unique-id-header", D | F | L),
    ("maxconn", G | D | F | L),
    // Server side.
    ("appsession", L | B),
    ("dispatch", L | B),
    ("http-check expect", L | B),
    ("server", L | B),
    ("stats admin", L | B),
    ("stats http-request", L | B),
    ("stick match", L | B),
    ("stick on", L | B),
    ("stick store-request", L | B),
    ("stick store-response", L | B),
    ("stick-table", L | B),
    ("tcp-response content", L | B),
    ("tcp-response inspect-delay", L | B),
    ("use-server", L | B),
    ("balance", D | L | B),
    ("cookie", D | L | B),
    ("default-server", D | L | B),
    ("fullconn", D | L | B),
    ("hash-type", D | L | B),
    ("http-check disable-on-404", D | L | B),
    ("http-check send-state", D | L | B),
    ("option abortonclose", D | L | B),
    ("option accept-invalid-http-response", D | L | B),
    ("option allbackups", D | L | B),
    ("option checkcache", D | L | B),
    ("option httpchk", D | L | B),
    ("option lb-agent-chk", D | L | B),
    ("option ldap-check", D | L | B),
    ("option log-health-checks", D | L | B),
    ("option mysql-check", D | L | B),
    ("option persist", D | L | B),
    ("option pgsql-check", D | L | B),
    ("option redis-check", D | L | B),
    ("option redispatch", D | L | B),
    ("option smtpchk", D | L | B),
    ("option srvtcpka", D | L | B),
    ("option ssl-hello-chk", D | L | B),
    ("option tcp-smart-connect", D | L | B),
    ("option transparent", D | L | B),
    ("persist rdp-cookie", D | L | B),
    ("retries", D | L | B),
    ("source", D | L | B),
    ("stats auth", D | L | B),
    ("stats enable", D | L | B),
    ("stats hide-version", D | L | B),
    ("stats realm", D | L | B),
    ("stats refresh", D | L | B),
    ("stats scope", D | L | B),
    ("stats show-desc", D | L | B),
    ("stats show-legends", D | L | B),
    ("stats show-node", D | L | B),
    ("stats uri", D | L | B),
    ("timeout check", D | L | B),
    ("timeout connect", D | L | B),
    ("timeout queue", D | L | B),
    ("timeout server", D | L | B),
    ("timeout tunnel", D | L | B),
    // Content switching and rewriting.
    ("acl", F | L | B),
    ("block", F | L | B),
    ("force-persist", F | L | B),
    ("http-request", F | L | B),
    ("id", F | L | B),
    ("ignore-persist", F | L | B),
    ("redirect", F | L | B),
    ("reqadd", F | L | B),
    ("reqallow", F | L | B),
    ("reqdel", F | L | B),
    ("reqdeny", F | L | B),
    ("reqiallow", F | L | B),
    ("reqidel", F | L | B),
    ("reqideny", F | L | B),
    ("reqipass", F | L | B),
    ("reqirep", F | L | B),
    ("reqisetbe", F | L | B),
    ("reqitarpit", F | L | B),
    ("reqpass", F | L | B),
    ("reqrep", F | L | B),
    ("reqsetbe", F | L | B),
    ("reqtarpit", F | L | B),
    ("rspadd", F | L | B),
    ("rspdel", F | L | B),
    ("rspdeny", F | L | B),
    ("rspidel", F | L | B),
    ("rspideny", F | L | B),
    ("rspirep", F | L | B),
    ("rsprep", F | L | B),
    ("tcp-request content", F | L | B),
    ("tcp-request inspect-delay", F | L | B),
    ("description", G | F | L | B),
    // Shared proxy behavior.
    ("bind-process", D | F | L | B),
    ("compression", D | F | L | B),
    ("disabled", D | F | L | B),
    ("enabled", D | F | L | B),
    ("errorfile", D | F | L | B),
    ("errorloc", D | F | L | B),
    ("errorloc302", D | F | L | B),
    ("errorloc303", D | F | L | B),
    ("grace", D | F | L | B),
    ("mode", D | F | L | B),
    ("option forceclose", D | F | L | B),
    ("option forwardfor", D | F | L | B),
    ("option http-no-delay", D | F | L | B),
    ("option http-pretend-keepalive", D | F | L | B),
    ("option http-server-close", D | F | L | B),
    ("option http_proxy", D | F | L | B),
    ("option httpclose", D | F | L | B),
    ("option httplog", D | F | L | B),
    ("option independent-streams", D | F | L | B),
    ("option nolinger", D | F | L | B),
    ("option originalto", D | F | L | B),
    ("option splice-auto", D | F | L | B),
    ("option splice-request", D | F | L | B),
    ("option splice-response", D | F | L | B),
    ("option tcpka", D | F | L | B),
    ("option tcplog", D | F | L | B),
    ("timeout http-keep-alive", D | F | L | B),
    ("timeout http-request", D | F | L | B),
    ("timeout tarpit", D | F | L | B),
    ("log", G | D | F | L | B),
];

static ALLOWED: OnceLock<[Vec<&'static str>; 6]> = OnceLock::new();

fn section_index(section: Section) -> usize {
    Section::ALL
        .iter()
        .position(|s| *s == section)
        .unwrap_or_default()
}

fn allow_lists() -> &'static [Vec<&'static str>; 6] {
    ALLOWED.get_or_init(|| {
        Section::ALL.map(|section| {
            KEYWORDS
                .iter()
                .filter(|(_, bits)| bits & section.bit() != 0)
                .map(|(key, _)| *key)
                .collect()
        })
    })
}

/// The keywords permitted in the given section.
pub fn allowed(section: Section) -> &'static [&'static str] {
    &allow_lists()[section_index(section)]
}

/// Whether `key` may be written into `section`.
pub fn is_allowed(section: Section, key: &str) -> bool {
    allowed(section).contains(&key)
}

/// Match a config line against the section's allow-list by string prefix.
///
/// When several keywords prefix the line (`maxconn` / `maxconnrate`), the
/// longest match wins.
pub fn match_keyword(section: Section, line: &str) -> Option<&'static str> {
    allowed(section)
        .iter()
        .filter(|key| line.starts_with(**key))
        .max_by_key(|key| key.len())
        .copied()
}
