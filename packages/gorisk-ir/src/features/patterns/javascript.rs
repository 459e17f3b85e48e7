//! JavaScript / npm pattern table
//!
//! Import keys are module specifiers (node builtins plus the common HTTP
//! client packages); call-site keys are `<module>.<export>` after alias
//! resolution, with a handful of bare globals (`eval`).

use super::LanguageTable;
use crate::shared::models::Language;

pub static TABLE: LanguageTable = LanguageTable {
    language: Language::JavaScript,
    imports: &[
        ("child_process", &["exec"]),
        ("node:child_process", &["exec"]),
        ("fs", &["fs:read", "fs:write"]),
        ("fs/promises", &["fs:read", "fs:write"]),
        ("node:fs", &["fs:read", "fs:write"]),
        ("net", &["network"]),
        ("http", &["network"]),
        ("https", &["network"]),
        ("http2", &["network"]),
        ("dgram", &["network"]),
        ("dns", &["network"]),
        ("tls", &["network", "crypto"]),
        ("node:net", &["network"]),
        ("node:http", &["network"]),
        ("node:https", &["network"]),
        ("crypto", &["crypto"]),
        ("node:crypto", &["crypto"]),
        ("vm", &["plugin"]),
        ("node:vm", &["plugin"]),
        ("os", &["env"]),
        ("node:os", &["env"]),
        // popular ecosystem HTTP clients
        ("axios", &["network"]),
        ("node-fetch", &["network"]),
        ("got", &["network"]),
        ("request", &["network"]),
        ("undici", &["network"]),
    ],
    call_sites: &[
        // subprocess execution
        ("child_process.exec", &["exec"]),
        ("child_process.execSync", &["exec"]),
        ("child_process.execFile", &["exec"]),
        ("child_process.execFileSync", &["exec"]),
        ("child_process.spawn", &["exec"]),
        ("child_process.spawnSync", &["exec"]),
        ("child_process.fork", &["exec"]),
        // filesystem
        ("fs.readFile", &["fs:read"]),
        ("fs.readFileSync", &["fs:read"]),
        ("fs.createReadStream", &["fs:read"]),
        ("fs.readdir", &["fs:read"]),
        ("fs.readdirSync", &["fs:read"]),
        ("fs.writeFile", &["fs:write"]),
        ("fs.writeFileSync", &["fs:write"]),
        ("fs.appendFile", &["fs:write"]),
        ("fs.appendFileSync", &["fs:write"]),
        ("fs.createWriteStream", &["fs:write"]),
        ("fs.unlink", &["fs:write"]),
        ("fs.unlinkSync", &["fs:write"]),
        ("fs.rm", &["fs:write"]),
        ("fs.rmSync", &["fs:write"]),
        ("fs.mkdir", &["fs:write"]),
        ("fs.mkdirSync", &["fs:write"]),
        // network
        ("http.request", &["network"]),
        ("http.get", &["network"]),
        ("https.request", &["network"]),
        ("https.get", &["network"]),
        ("net.connect", &["network"]),
        ("net.createConnection", &["network"]),
        ("net.createServer", &["network"]),
        ("dns.lookup", &["network"]),
        ("axios.get", &["network"]),
        ("axios.post", &["network"]),
        ("axios.request", &["network"]),
        // environment
        ("process.env", &["env"]),
        ("os.userInfo", &["env"]),
        ("os.hostname", &["env"]),
        // crypto
        ("crypto.createHash", &["crypto"]),
        ("crypto.createHmac", &["crypto"]),
        ("crypto.createCipheriv", &["crypto"]),
        ("crypto.createDecipheriv", &["crypto"]),
        ("crypto.randomBytes", &["crypto"]),
        ("crypto.randomUUID", &["crypto"]),
        // dynamic code
        ("vm.runInNewContext", &["plugin"]),
        ("vm.runInThisContext", &["plugin"]),
        ("vm.compileFunction", &["plugin"]),
        ("eval", &["plugin"]),
    ],
};
