//! Prompt construction for accounting-row extraction.

use std::fmt::Display;
use std::fmt::Write;

pub const SYSTEM_PROMPT: &str = "Tu es un assistant intelligent d'extraction comptable.";

/// Fields of every extracted row, in output order.
pub const ROW_FIELDS: [&str; 5] = ["compte", "solde_an", "solde", "débit", "crédit"];

const INSTRUCTIONS: &str = "Ta mission :
1. Identifier les lignes comptables dans l'ordre exact où elles apparaissent dans les tokens.
2. Retourner UNIQUEMENT un JSON valide, sous forme de liste d'objets.
3. Chaque objet JSON doit contenir les champs suivants : compte, solde_an, solde, débit, crédit.
4. Pour chaque champ :
   - Si une valeur est trouvée, retourne un tableau [valeur, id] où 'valeur' est la valeur extraite et 'id' est l'identifiant du token correspondant.
   - Si la valeur est absente, retourne [null, null].
5. Pour les champs débit et crédit :
   - Si aucune valeur n'est présente, retourne [0, null].
6. Respecte strictement ce format pour chaque champ, sans exception.
7. Ne modifie pas l'ordre des lignes comptables détectées.
";

/// Build the user prompt from `(id, text)` token pairs, in order, followed
/// by rows validated on similar documents when there are any.
pub fn build_prompt<I, K, V>(tokens: I, examples: &[serde_json::Value]) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Display,
    V: Display,
{
    let mut prompt = String::from(
        "\nTu es un assistant expert en analyse comptable.\n\n\
         On te donne une liste de tokens extraits d'un document PDF :\n",
    );
    for (id, text) in tokens {
        let _ = writeln!(prompt, "{}: {}", id, text);
    }
    prompt.push('\n');
    prompt.push_str(INSTRUCTIONS);

    if !examples.is_empty() {
        prompt.push_str(
            "\nVoici des lignes déjà validées sur des documents similaires. \
             Inspire-toi de leur structure, pas de leurs valeurs :\n",
        );
        for example in examples {
            let _ = writeln!(prompt, "{}", example);
        }
    }
    prompt
}
