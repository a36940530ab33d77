//! Reading tree files and writing labeled distance matrices.
//!
//! Two input layouts are understood:
//! - BEAST / NEXUS `.trees` files, with an optional TRANSLATE block and
//!   `[&...]` annotations inside the Newick strings;
//! - plain Newick files holding one or more `;`-terminated trees.
//!
//! Trees that fail to parse are skipped with a warning; the remaining ones
//! are returned with a name derived from the file and their position.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use phylotree::tree::Tree;
use tracing::{info, warn};

/// Which leading trees of a sample to discard.
///
/// With both fields at 0 every tree is kept. Otherwise a tree is kept when
/// its position is at least `trees`, or its STATE is above `states`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurnIn {
    pub trees: usize,
    pub states: usize,
}

impl BurnIn {
    pub fn keeps(&self, position: usize, state: usize) -> bool {
        (self.trees == 0 && self.states == 0)
            || (self.trees > 0 && position >= self.trees)
            || (self.states > 0 && state > self.states)
    }
}

/// A tree together with the name it is reported under.
pub type NamedTree = (String, Tree);

/// Remove BEAST `[&...]` annotations, keeping branch lengths.
///
/// `:[&rate=0.123]2.45` becomes `:2.45`.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '[' if chars.peek() == Some(&'&') => in_annotation = true,
            ']' if in_annotation => in_annotation = false,
            _ if !in_annotation => result.push(ch),
            _ => {}
        }
    }

    result
}

fn base_name(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
}

/// STATE number from a `tree STATE_123 = ...` header, or 0.
fn extract_state(header: &str) -> usize {
    let upper = header.to_ascii_uppercase();
    upper
        .find("STATE_")
        .map(|start| {
            upper[start + 6..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// `id -> label` pairs of the TRANSLATE block.
///
/// ```text
/// Translate
///     1 '1959.M.CD.59.ZR59',
///     2 '1960.DRC60A'
/// ;
/// ```
fn parse_translate_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().starts_with(';'))
        .filter_map(|line| {
            let line = line.trim().trim_end_matches([',', ';']);
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect()
}

/// `(header, newick)` of every `tree ... = ...` line in the TREES block.
fn tree_lines(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let (header, body) = line.split_once('=')?;
            Some((header.trim(), body.trim()))
        })
        .collect()
}

fn parse_newick(newick: &str, name: &str) -> Option<Tree> {
    match Tree::from_newick(newick) {
        Ok(tree) => Some(tree),
        Err(e) => {
            warn!(tree = name, error = %e, "Skipping unparseable tree");
            None
        }
    }
}

fn apply_translation(tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in tree.get_leaves() {
        if let Ok(node) = tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Parse the trees of a BEAST / NEXUS document.
///
/// Returns the TRANSLATE map (possibly empty) and the kept trees, named
/// `<base>_tree_STATE<state>`. With `use_real_taxa` leaf ids are replaced by
/// their TRANSLATE labels.
pub fn parse_nexus(
    content: &str,
    base: &str,
    burnin: &BurnIn,
    use_real_taxa: bool,
) -> (HashMap<String, String>, Vec<NamedTree>) {
    let translate = parse_translate_block(content);

    let trees = tree_lines(content)
        .into_iter()
        .enumerate()
        .map(|(idx, (header, body))| (idx, extract_state(header), body))
        .filter(|&(idx, state, _)| burnin.keeps(idx, state))
        .filter_map(|(_, state, body)| {
            let name = format!("{base}_tree_STATE{state}");
            let newick = strip_beast_annotations(body);
            let mut tree = parse_newick(newick.trim(), &name)?;
            if use_real_taxa {
                apply_translation(&mut tree, &translate);
            }
            Some((name, tree))
        })
        .collect();

    (translate, trees)
}

/// Parse `;`-terminated Newick records, named `<base>_tree<k>`.
///
/// Only the tree-count part of `burnin` applies.
pub fn parse_newick_records(content: &str, base: &str, burnin: &BurnIn) -> Vec<NamedTree> {
    content
        .split(';')
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .enumerate()
        .filter(|&(idx, _)| burnin.trees == 0 || idx >= burnin.trees)
        .filter_map(|(idx, record)| {
            let name = format!("{base}_tree{idx}");
            let newick = format!("{};", strip_beast_annotations(record).trim());
            parse_newick(&newick, &name).map(|tree| (name, tree))
        })
        .collect()
}

/// Read a BEAST / NEXUS `.trees` file.
pub fn read_beast_trees<P: AsRef<Path>>(
    path: P,
    burnin: &BurnIn,
    use_real_taxa: bool,
) -> io::Result<(HashMap<String, String>, Vec<NamedTree>)> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(parse_nexus(&content, base_name(path), burnin, use_real_taxa))
}

/// Read a plain Newick file.
pub fn read_newick_trees<P: AsRef<Path>>(path: P, burnin: &BurnIn) -> io::Result<Vec<NamedTree>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(parse_newick_records(&content, base_name(path), burnin))
}

/// Read a tree file, detecting NEXUS by its `#NEXUS` header.
pub fn read_trees<P: AsRef<Path>>(
    path: P,
    burnin: &BurnIn,
    use_real_taxa: bool,
) -> io::Result<Vec<NamedTree>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let base = base_name(path);

    let is_nexus = content
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("#NEXUS"));
    let trees = if is_nexus {
        parse_nexus(&content, base, burnin, use_real_taxa).1
    } else {
        parse_newick_records(&content, base, burnin)
    };

    info!(path = %path.display(), trees = trees.len(), nexus = is_nexus, "Read trees");
    Ok(trees)
}

/// Write a labeled square matrix as TSV.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_matrix_tsv<P: AsRef<Path>, T: std::fmt::Display>(
    path: P,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    let p = path.as_ref();
    if names.len() != mat.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} names for a {}-row matrix", names.len(), mat.len()),
        ));
    }

    let is_gz = p.to_string_lossy().ends_with(".gz");
    let file = File::create(p)?;
    if is_gz {
        write_gz_rows(BufWriter::new(file), names, mat)?.flush()
    } else {
        let mut out = BufWriter::new(file);
        write_rows(&mut out, names, mat)?;
        out.flush()
    }
}

/// Gzip the rows into `inner` and finish the stream, trailer included.
fn write_gz_rows<W: Write, T: std::fmt::Display>(
    inner: W,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<W> {
    let mut encoder = GzEncoder::new(inner, Compression::default());
    write_rows(&mut encoder, names, mat)?;
    encoder.finish()
}

fn write_rows<W: Write, T: std::fmt::Display>(
    out: &mut W,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    // Header row
    write!(out, "\t{}", names.join("\t"))?;
    writeln!(out)?;

    for (name, row) in names.iter().zip(mat) {
        write!(out, "{name}")?;
        for val in row {
            write!(out, "\t{val}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const NEXUS: &str = "#NEXUS

Begin trees;
\tTranslate
\t\t1 'Homo',
\t\t2 'Pan',
\t\t3 'Gorilla',
\t\t4 'Pongo'
\t\t;
tree STATE_0 = [&R] ((1:[&rate=0.5]1.0,2:1.0):0.5,(3:1.0,4:1.0):0.5);
tree STATE_1000 = [&R] ((1:1.0,3:1.0):0.5,(2:1.0,4:1.0):0.5);
tree STATE_2000 = [&R] ((1:1.0,2:1.0):0.5,(3:1.0,4:1.0):0.5);
End;
";

    fn leaf_names(tree: &Tree) -> Vec<String> {
        let mut names: Vec<String> = tree.get_leaf_names().into_iter().flatten().collect();
        names.sort();
        names
    }

    #[test]
    fn test_strip_beast_annotations() {
        assert_eq!(
            strip_beast_annotations("(A:[&rate=0.1]1.5,B:2)[&R];"),
            "(A:1.5,B:2);"
        );
        // Plain comments without '&' are left alone.
        assert_eq!(strip_beast_annotations("(A[x],B);"), "(A[x],B);");
    }

    #[test]
    fn test_extract_state() {
        assert_eq!(extract_state("tree STATE_1000"), 1000);
        assert_eq!(extract_state("TREE state_42 "), 42);
        assert_eq!(extract_state("tree tree_1"), 0);
    }

    #[test]
    fn test_parse_nexus_with_translation() {
        let (translate, trees) = parse_nexus(NEXUS, "run", &BurnIn::default(), true);
        assert_eq!(translate.len(), 4);
        assert_eq!(translate["3"], "Gorilla");
        assert_eq!(trees.len(), 3);
        assert_eq!(trees[1].0, "run_tree_STATE1000");
        assert_eq!(leaf_names(&trees[0].1), vec!["Gorilla", "Homo", "Pan", "Pongo"]);
    }

    #[test]
    fn test_parse_nexus_burnin() {
        let by_count = BurnIn { trees: 2, states: 0 };
        let (_, trees) = parse_nexus(NEXUS, "run", &by_count, false);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].0, "run_tree_STATE2000");
        assert_eq!(leaf_names(&trees[0].1), vec!["1", "2", "3", "4"]);

        let by_state = BurnIn { trees: 0, states: 500 };
        let (_, trees) = parse_nexus(NEXUS, "run", &by_state, false);
        assert_eq!(trees.len(), 2);
    }

    #[test]
    fn test_parse_newick_records_skips_bad_trees() {
        let content = "((A,B),(C,D));\n((A,C),(B,D));\n((A,B),(C,D);\n";
        let trees = parse_newick_records(content, "sample", &BurnIn::default());
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].0, "sample_tree0");
        assert_eq!(trees[1].0, "sample_tree1");
    }

    #[test]
    fn test_read_trees_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let nexus_path = dir.path().join("run.trees");
        fs::write(&nexus_path, NEXUS).unwrap();
        let newick_path = dir.path().join("plain.nwk");
        fs::write(&newick_path, "((A,B),(C,D));((A,C),(B,D));").unwrap();

        let nexus = read_trees(&nexus_path, &BurnIn::default(), true).unwrap();
        assert_eq!(nexus.len(), 3);
        assert_eq!(nexus[0].0, "run_tree_STATE0");

        let newick = read_trees(&newick_path, &BurnIn::default(), false).unwrap();
        assert_eq!(newick.len(), 2);
        assert_eq!(newick[1].0, "plain_tree1");

        assert!(read_trees(dir.path().join("missing.trees"), &BurnIn::default(), false).is_err());
    }

    #[test]
    fn test_write_matrix_tsv_plain_and_gz() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["t0".to_string(), "t1".to_string()];
        let mat = vec![vec![0.0, 0.5], vec![0.5, 0.0]];
        let expected = "\tt0\tt1\nt0\t0\t0.5\nt1\t0.5\t0\n";

        let plain = dir.path().join("out.tsv");
        write_matrix_tsv(&plain, &names, &mat).unwrap();
        assert_eq!(fs::read_to_string(&plain).unwrap(), expected);

        let gz = dir.path().join("out.tsv.gz");
        write_matrix_tsv(&gz, &names, &mat).unwrap();
        let mut decoded = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, expected);

        assert!(write_matrix_tsv(&plain, &names[..1], &mat).is_err());
    }

    /// Accepts `budget` bytes, then fails every write.
    #[derive(Debug)]
    struct ShortWriter {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_gz_trailer_failure_is_reported() {
        let names = vec!["t0".to_string(), "t1".to_string()];
        let mat = vec![vec![0.0, 0.5], vec![0.5, 0.0]];

        let unlimited = ShortWriter {
            written: Vec::new(),
            budget: usize::MAX,
        };
        let full = write_gz_rows(unlimited, &names, &mat).unwrap();
        let complete = full.written.len();
        // 8-byte trailer: CRC32 and input size.
        assert!(complete > 8);

        let short = ShortWriter {
            written: Vec::new(),
            budget: complete - 1,
        };
        let err = write_gz_rows(short, &names, &mat).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
    }
}
