//! Go pattern table
//!
//! Import paths are standard-library packages whose presence implies a
//! capability; call-site keys are `<pkgShort>.<Func>` after alias
//! resolution.

use super::LanguageTable;
use crate::shared::models::Language;

pub static TABLE: LanguageTable = LanguageTable {
    language: Language::Go,
    imports: &[
        ("os/exec", &["exec"]),
        ("os", &["env", "fs:read", "fs:write"]),
        ("os/user", &["env"]),
        ("io/ioutil", &["fs:read", "fs:write"]),
        ("syscall", &["unsafe", "exec"]),
        ("unsafe", &["unsafe"]),
        ("plugin", &["plugin"]),
        ("reflect", &["reflect"]),
        ("net", &["network"]),
        ("net/http", &["network"]),
        ("net/rpc", &["network"]),
        ("net/smtp", &["network"]),
        ("crypto/aes", &["crypto"]),
        ("crypto/cipher", &["crypto"]),
        ("crypto/des", &["crypto"]),
        ("crypto/ecdsa", &["crypto"]),
        ("crypto/ed25519", &["crypto"]),
        ("crypto/hmac", &["crypto"]),
        ("crypto/md5", &["crypto"]),
        ("crypto/rand", &["crypto"]),
        ("crypto/rsa", &["crypto"]),
        ("crypto/sha1", &["crypto"]),
        ("crypto/sha256", &["crypto"]),
        ("crypto/sha512", &["crypto"]),
        ("crypto/tls", &["crypto", "network"]),
    ],
    call_sites: &[
        // subprocess execution
        ("exec.Command", &["exec"]),
        ("exec.CommandContext", &["exec"]),
        ("os.StartProcess", &["exec"]),
        ("syscall.Exec", &["exec"]),
        ("syscall.ForkExec", &["exec"]),
        // environment
        ("os.Getenv", &["env"]),
        ("os.LookupEnv", &["env"]),
        ("os.Setenv", &["env"]),
        ("os.Environ", &["env"]),
        ("os.ExpandEnv", &["env"]),
        // filesystem
        ("os.Open", &["fs:read"]),
        ("os.ReadFile", &["fs:read"]),
        ("os.ReadDir", &["fs:read"]),
        ("ioutil.ReadFile", &["fs:read"]),
        ("ioutil.ReadDir", &["fs:read"]),
        ("os.Create", &["fs:write"]),
        ("os.OpenFile", &["fs:write"]),
        ("os.WriteFile", &["fs:write"]),
        ("os.Mkdir", &["fs:write"]),
        ("os.MkdirAll", &["fs:write"]),
        ("os.Remove", &["fs:write"]),
        ("os.RemoveAll", &["fs:write"]),
        ("os.Rename", &["fs:write"]),
        ("ioutil.WriteFile", &["fs:write"]),
        // network
        ("http.Get", &["network"]),
        ("http.Post", &["network"]),
        ("http.PostForm", &["network"]),
        ("http.Head", &["network"]),
        ("http.NewRequest", &["network"]),
        ("http.ListenAndServe", &["network"]),
        ("http.ListenAndServeTLS", &["network"]),
        ("net.Dial", &["network"]),
        ("net.DialTimeout", &["network"]),
        ("net.Listen", &["network"]),
        ("tls.Dial", &["network", "crypto"]),
        ("tls.Listen", &["network", "crypto"]),
        // dynamic loading
        ("plugin.Open", &["plugin"]),
        // reflection
        ("reflect.ValueOf", &["reflect"]),
        ("reflect.TypeOf", &["reflect"]),
        ("reflect.New", &["reflect"]),
        // crypto
        ("rand.Read", &["crypto"]),
        ("aes.NewCipher", &["crypto"]),
        ("rsa.GenerateKey", &["crypto"]),
        ("sha256.Sum256", &["crypto"]),
        ("hmac.New", &["crypto"]),
    ],
};
